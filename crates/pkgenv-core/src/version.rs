//! Version parsing, ordering, and interval algebra.
//!
//! A version is a dotted sequence of components, each either a non-negative
//! integer or a lowercase alphabetic token:
//! - Numeric components compare as numbers
//! - Alphabetic components compare as strings
//! - Every numeric component sorts before every alphabetic one
//! - A strict prefix sorts before any of its extensions (`1.2` < `1.2.0`)
//!
//! Ranges are unions of half-open intervals `[ge, lt)`. An exact version
//! `1.2` covers `[1.2, 1.3)`, so it also matches `1.2.5`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while parsing versions and ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum VersionError {
    #[error("empty component in version `{input}`")]
    EmptyComponent { input: String },

    #[error("invalid component `{component}` in version `{input}`")]
    #[diagnostic(help(
        "components are non-negative integers or lowercase letters, separated by `.`"
    ))]
    InvalidComponent { component: String, input: String },

    #[error("leading zero in component `{component}` of version `{input}`")]
    LeadingZero { component: String, input: String },

    #[error("component `{component}` of version `{input}` is too large")]
    #[diagnostic(help("numeric components must be below {}", u64::MAX))]
    ComponentTooLarge { component: String, input: String },

    #[error("invalid version range `{input}`: upper bound must be above lower bound")]
    EmptyInterval { input: String },

    #[error("invalid version range `{input}`")]
    InvalidRange { input: String },
}

/// One dotted component of a version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Number(u64),
    Alpha(String),
}

impl Component {
    fn parse(token: &str, input: &str) -> Result<Self, VersionError> {
        if token.is_empty() {
            return Err(VersionError::EmptyComponent {
                input: input.to_string(),
            });
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            if token.len() > 1 && token.starts_with('0') {
                return Err(VersionError::LeadingZero {
                    component: token.to_string(),
                    input: input.to_string(),
                });
            }
            // Every component needs a successor for the exact upper bound.
            return token
                .parse::<u64>()
                .ok()
                .filter(|n| n.checked_add(1).is_some())
                .map(Component::Number)
                .ok_or_else(|| VersionError::ComponentTooLarge {
                    component: token.to_string(),
                    input: input.to_string(),
                });
        }
        if token.bytes().all(|b| b.is_ascii_lowercase()) {
            return Ok(Component::Alpha(token.to_string()));
        }
        Err(VersionError::InvalidComponent {
            component: token.to_string(),
            input: input.to_string(),
        })
    }

    /// The smallest component strictly greater than this one.
    ///
    /// Parsed numbers stay below `u64::MAX`, so the addition cannot saturate.
    fn successor(&self) -> Self {
        match self {
            Component::Number(n) => Component::Number(n.saturating_add(1)),
            Component::Alpha(s) => Component::Alpha(format!("{s}a")),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Number(n) => write!(f, "{n}"),
            Component::Alpha(s) => f.write_str(s),
        }
    }
}

/// A parsed, comparable version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    components: Vec<Component>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let components = input
            .split('.')
            .map(|token| Component::parse(token, input))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    /// The smallest valid version, `0`.
    pub fn zero() -> Self {
        Self {
            components: vec![Component::Number(0)],
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The same version with its last component replaced by its successor.
    ///
    /// This is the exclusive upper bound of the exact version.
    pub fn increment(&self) -> Self {
        let mut components = self.components.clone();
        if let Some(last) = components.pop() {
            components.push(last.successor());
        }
        Self { components }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Exclusive upper bound of an interval.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    Finite(Version),
    Inf,
}

impl Bound {
    /// True if `version` lies strictly below this bound.
    pub fn exceeds(&self, version: &Version) -> bool {
        match self {
            Bound::Finite(lt) => version < lt,
            Bound::Inf => true,
        }
    }

    /// Compare a lower bound (always finite) against this upper bound.
    fn cmp_lower(&self, ge: &Version) -> Ordering {
        match self {
            Bound::Finite(lt) => lt.cmp(ge),
            Bound::Inf => Ordering::Greater,
        }
    }
}

/// A single contiguous half-open interval `[ge, lt)`.
///
/// Lower bounds below zero clamp to `0`, so `ge` is always a real version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionInterval {
    ge: Version,
    lt: Bound,
}

impl VersionInterval {
    /// Build `[ge, lt)`, rejecting empty intervals.
    pub fn new(ge: Version, lt: Bound) -> Result<Self, VersionError> {
        if lt.cmp_lower(&ge) != Ordering::Greater {
            return Err(VersionError::EmptyInterval {
                input: format!("{ge}+<{}", display_bound(&lt)),
            });
        }
        Ok(Self { ge, lt })
    }

    /// Every version.
    pub fn any() -> Self {
        Self {
            ge: Version::zero(),
            lt: Bound::Inf,
        }
    }

    pub fn exact(version: Version) -> Self {
        let lt = Bound::Finite(version.increment());
        Self { ge: version, lt }
    }

    pub fn at_least(version: Version) -> Self {
        Self {
            ge: version,
            lt: Bound::Inf,
        }
    }

    /// Parse `V`, `V+`, `V+<W` or `<W`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if let Some(upper) = input.strip_prefix('<') {
            let lt = Version::parse(upper)?;
            return Self::new(Version::zero(), Bound::Finite(lt)).map_err(|_| {
                VersionError::EmptyInterval {
                    input: input.to_string(),
                }
            });
        }
        if let Some((lower, upper)) = input.split_once("+<") {
            let ge = Version::parse(lower)?;
            let lt = Version::parse(upper)?;
            return Self::new(ge, Bound::Finite(lt)).map_err(|_| VersionError::EmptyInterval {
                input: input.to_string(),
            });
        }
        if let Some(lower) = input.strip_suffix('+') {
            return Ok(Self::at_least(Version::parse(lower)?));
        }
        Ok(Self::exact(Version::parse(input)?))
    }

    pub fn ge(&self) -> &Version {
        &self.ge
    }

    pub fn lt(&self) -> &Bound {
        &self.lt
    }

    pub fn is_any(&self) -> bool {
        self.lt == Bound::Inf && self.ge == Version::zero()
    }

    pub fn is_exact(&self) -> bool {
        matches!(&self.lt, Bound::Finite(lt) if *lt == self.ge.increment())
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.ge <= *version && self.lt.exceeds(version)
    }

    /// `[max(ge), min(lt))`, or `None` when that is empty.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let ge = (&self.ge).max(&other.ge).clone();
        let lt = (&self.lt).min(&other.lt).clone();
        Self::new(ge, lt).ok()
    }

    /// Merge two intervals that overlap or touch; `None` if they are apart.
    pub fn union(&self, other: &Self) -> Option<Self> {
        let touching = self.lt.cmp_lower(&other.ge) != Ordering::Less
            && other.lt.cmp_lower(&self.ge) != Ordering::Less;
        touching.then(|| Self {
            ge: (&self.ge).min(&other.ge).clone(),
            lt: (&self.lt).max(&other.lt).clone(),
        })
    }
}

impl fmt::Display for VersionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lt {
            Bound::Inf => write!(f, "{}+", self.ge),
            Bound::Finite(_) if self.is_exact() => write!(f, "{}", self.ge),
            Bound::Finite(lt) => write!(f, "{}+<{lt}", self.ge),
        }
    }
}

fn display_bound(bound: &Bound) -> String {
    match bound {
        Bound::Finite(v) => v.to_string(),
        Bound::Inf => "inf".to_string(),
    }
}

/// A normalized union of disjoint, non-adjacent intervals, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    intervals: Vec<VersionInterval>,
}

impl VersionRange {
    /// Parse `|`-separated intervals. The empty string means any version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        if input.is_empty() {
            return Ok(Self::any());
        }
        let intervals = input
            .split('|')
            .map(|part| {
                if part.is_empty() {
                    Err(VersionError::InvalidRange {
                        input: input.to_string(),
                    })
                } else {
                    VersionInterval::parse(part)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_intervals(intervals))
    }

    /// Normalize possibly overlapping intervals by pairwise union.
    pub fn from_intervals(mut intervals: Vec<VersionInterval>) -> Self {
        intervals.sort_by(|a, b| a.ge.cmp(&b.ge).then_with(|| a.lt.cmp(&b.lt)));
        let mut merged: Vec<VersionInterval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if let Some(last) = merged.last_mut() {
                if let Some(joined) = last.union(&interval) {
                    *last = joined;
                    continue;
                }
            }
            merged.push(interval);
        }
        Self { intervals: merged }
    }

    pub fn any() -> Self {
        Self {
            intervals: vec![VersionInterval::any()],
        }
    }

    /// The range containing no version at all.
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    pub fn exact(version: Version) -> Self {
        Self {
            intervals: vec![VersionInterval::exact(version)],
        }
    }

    pub fn intervals(&self) -> &[VersionInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_any(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_any()
    }

    pub fn is_exact(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_exact()
    }

    /// The pinned version when this range is exact.
    pub fn exact_version(&self) -> Option<&Version> {
        self.is_exact().then(|| &self.intervals[0].ge)
    }

    /// Lowest version contained in the range.
    pub fn lower(&self) -> Option<&Version> {
        self.intervals.first().map(|i| &i.ge)
    }

    /// Exclusive upper bound of the whole range.
    pub fn upper(&self) -> Option<&Bound> {
        self.intervals.last().map(|i| &i.lt)
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for a in &self.intervals {
            for b in &other.intervals {
                if let Some(i) = a.intersection(b) {
                    out.push(i);
                }
            }
        }
        Self::from_intervals(out)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.intervals
            .iter()
            .any(|a| other.intervals.iter().any(|b| a.intersection(b).is_some()))
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        Self::from_intervals(all)
    }

    /// The complement of this range.
    ///
    /// The sorted intervals are bracketed by `-inf` and `+inf` and the gaps
    /// between consecutive bounds become the result. A gap starting at
    /// `-inf` clamps to `0`; zero-width gaps are dropped.
    pub fn inverse(&self) -> Self {
        let mut out = Vec::new();
        let mut start = Bound::Finite(Version::zero());
        for interval in &self.intervals {
            if let Bound::Finite(from) = &start {
                if let Ok(gap) = VersionInterval::new(from.clone(), Bound::Finite(interval.ge.clone()))
                {
                    out.push(gap);
                }
            }
            start = interval.lt.clone();
        }
        if let Bound::Finite(from) = start {
            out.push(VersionInterval::at_least(from));
        }
        Self { intervals: out }
    }

    /// Convex hull of two ranges: from the lowest lower bound to the highest
    /// upper bound.
    pub fn span(&self, other: &Self) -> Self {
        let ge = match (self.lower(), other.lower()) {
            (Some(a), Some(b)) => a.min(b).clone(),
            (Some(a), None) | (None, Some(a)) => a.clone(),
            (None, None) => return Self::empty(),
        };
        let lt = match (self.upper(), other.upper()) {
            (Some(a), Some(b)) => a.max(b).clone(),
            (Some(a), None) | (None, Some(a)) => a.clone(),
            (None, None) => return Self::empty(),
        };
        VersionInterval::new(ge, lt)
            .map(|i| Self { intervals: vec![i] })
            .unwrap_or_else(|_| Self::empty())
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return Ok(());
        }
        if self.intervals.is_empty() {
            return f.write_str("<empty>");
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{interval}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionRange::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    const SAMPLES: &[&str] = &[
        "",
        "1",
        "1.2",
        "1+",
        "0+<3",
        "1.2+<1.5",
        "2|4+",
        "1|3|5+<7",
        "1.a",
        "a+",
    ];

    #[test]
    fn numeric_ordering() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("2") < v("10"));
        assert!(v("1.0.0") < v("1.0.1"));
    }

    #[test]
    fn prefix_sorts_first() {
        assert!(v("1.2") < v("1.2.0"));
        assert!(v("1") < v("1.0"));
    }

    #[test]
    fn numbers_before_letters() {
        assert!(v("1.9") < v("1.a"));
        assert!(v("1.a") < v("1.b"));
        assert!(v("9") < v("linux"));
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(matches!(
            Version::parse("1.03"),
            Err(VersionError::LeadingZero { .. })
        ));
        assert!(Version::parse("1.0").is_ok());
    }

    #[test]
    fn rejects_bad_components() {
        assert!(matches!(
            Version::parse("1..2"),
            Err(VersionError::EmptyComponent { .. })
        ));
        assert!(Version::parse("1.2a").is_err());
        assert!(Version::parse("1.A").is_err());
        assert!(Version::parse("1-2").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn rejects_component_without_successor() {
        assert!(matches!(
            Version::parse("1.18446744073709551615"),
            Err(VersionError::ComponentTooLarge { .. })
        ));
        assert!(VersionRange::parse("18446744073709551615").is_err());
        assert!(VersionRange::parse("18446744073709551616+").is_err());

        let largest = v("18446744073709551614");
        let exact = VersionRange::exact(largest.clone());
        assert!(exact.contains(&largest));
        assert!(!exact.is_empty());
    }

    #[test]
    fn increment_last_component() {
        assert_eq!(v("1.2").increment(), v("1.3"));
        assert_eq!(v("1.a").increment(), v("1.aa"));
        assert_eq!(v("9").increment(), v("10"));
    }

    #[test]
    fn exact_interval_covers_prefix_extensions() {
        let range = r("1.2");
        assert!(range.is_exact());
        assert!(range.contains(&v("1.2")));
        assert!(range.contains(&v("1.2.5")));
        assert!(!range.contains(&v("1.3")));
        assert!(!range.contains(&v("1.1")));
    }

    #[test]
    fn open_interval() {
        let range = r("2.6+");
        assert!(range.contains(&v("2.6")));
        assert!(range.contains(&v("3")));
        assert!(!range.contains(&v("2.5")));
        assert!(!range.is_exact());
    }

    #[test]
    fn bounded_interval() {
        let range = r("0+<3");
        assert!(range.contains(&v("0")));
        assert!(range.contains(&v("2.99")));
        assert!(!range.contains(&v("3")));
    }

    #[test]
    fn empty_string_is_any() {
        let range = r("");
        assert!(range.is_any());
        assert!(range.contains(&v("0")));
        assert!(range.contains(&v("linux")));
        assert_eq!(range.to_string(), "");
    }

    #[test]
    fn inverted_interval_rejected() {
        assert!(matches!(
            VersionRange::parse("3+<2"),
            Err(VersionError::EmptyInterval { .. })
        ));
        assert!(VersionRange::parse("2+<2").is_err());
        assert!(VersionRange::parse("1||2").is_err());
    }

    #[test]
    fn normalizes_overlapping_intervals() {
        assert_eq!(r("1+<3|2+<5"), r("1+<5"));
        assert_eq!(r("3|1|2"), r("1+<4"));
        assert_eq!(r("4+|1").to_string(), "1|4+");
        assert_eq!(r("0+<2|2+"), VersionRange::any());
    }

    #[test]
    fn adjacent_exact_letters_merge() {
        assert_eq!(r("1.a|1.aa").to_string(), "1.a+<1.aaa");
        assert_eq!(r("1.a|1.b").to_string(), "1.a|1.b");
    }

    #[test]
    fn interval_intersection() {
        let a = VersionInterval::parse("1+<5").unwrap();
        let b = VersionInterval::parse("3+").unwrap();
        assert_eq!(a.intersection(&b).unwrap().to_string(), "3+<5");
        let c = VersionInterval::parse("5+").unwrap();
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn interval_union() {
        let a = VersionInterval::parse("1+<3").unwrap();
        let b = VersionInterval::parse("3+<4").unwrap();
        assert_eq!(a.union(&b).unwrap().to_string(), "1+<4");
        let c = VersionInterval::parse("5").unwrap();
        assert!(a.union(&c).is_none());
    }

    #[test]
    fn inverse_examples() {
        assert_eq!(r("2").inverse().to_string(), "0+<2|3+");
        assert_eq!(r("1+").inverse().to_string(), "0");
        assert_eq!(r("2+").inverse().to_string(), "0+<2");
        assert!(VersionRange::any().inverse().is_empty());
        assert!(VersionRange::empty().inverse().is_any());
        assert_eq!(r("0+<3").inverse().to_string(), "3+");
    }

    #[test]
    fn intersection_is_commutative() {
        for a in SAMPLES {
            for b in SAMPLES {
                assert_eq!(r(a).intersection(&r(b)), r(b).intersection(&r(a)), "{a} & {b}");
            }
        }
    }

    #[test]
    fn union_is_commutative() {
        for a in SAMPLES {
            for b in SAMPLES {
                assert_eq!(r(a).union(&r(b)), r(b).union(&r(a)), "{a} | {b}");
            }
        }
    }

    #[test]
    fn inverse_is_involution() {
        for s in SAMPLES {
            assert_eq!(r(s).inverse().inverse(), r(s), "{s}");
        }
    }

    #[test]
    fn display_reparses_to_same_range() {
        for s in SAMPLES {
            let range = r(s);
            assert_eq!(r(&range.to_string()), range, "{s}");
        }
    }

    #[test]
    fn contains_agrees_with_intersection() {
        // Bounds no deeper than the probed versions, so no exact version
        // straddles a bound.
        let ranges = ["", "1", "1+", "0+<3", "2|4+", "1|3|5+<7", "a+"];
        let versions = ["0", "1", "1.2", "1.2.7", "2", "3", "4.1", "6", "a.1", "b"];
        for s in ranges {
            let range = r(s);
            for ver in versions {
                let exact = VersionRange::exact(v(ver));
                assert_eq!(
                    range.contains(&v(ver)),
                    !range.intersection(&exact).is_empty(),
                    "{s} contains {ver}"
                );
            }
        }
    }

    #[test]
    fn deeper_bound_splits_exact_prefix() {
        // `1.2` stands for every `1.2.*`, so it overlaps `1.2.5+` while the
        // version `1.2` itself lies below the bound.
        let range = r("1.2.5+");
        assert!(!range.contains(&v("1.2")));
        assert!(!range.intersection(&VersionRange::exact(v("1.2"))).is_empty());
        assert!(range.contains(&v("1.2.7")));
    }

    #[test]
    fn span_covers_both() {
        assert_eq!(r("1.2").span(&r("1.5")).to_string(), "1.2+<1.6");
        assert_eq!(r("2+").span(&r("1")).to_string(), "1+");
    }

    #[test]
    fn exact_version_accessor() {
        assert_eq!(r("1.4").exact_version(), Some(&v("1.4")));
        assert_eq!(r("1.4+").exact_version(), None);
        assert_eq!(r("1.4|2").exact_version(), None);
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&r("1|4+")).unwrap();
        assert_eq!(json, "\"1|4+\"");
        let back: VersionRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r("1|4+"));
    }
}

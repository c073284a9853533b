//! Package requests: `family[-range]` with optional `!` (anti) or `~` (weak)
//! sigils.

use std::fmt;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::version::{Version, VersionError, VersionRange};

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum RequestError {
    #[error("empty package request")]
    Empty,

    #[error("invalid package family in request `{input}`")]
    #[diagnostic(help(
        "family names use letters, digits and `_`; the only sigils are `!` and `~`"
    ))]
    InvalidFamily { input: String },

    #[error("invalid version in request `{input}`: {source}")]
    Version {
        input: String,
        #[source]
        source: VersionError,
    },
}

/// Whether a request demands or forbids its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// The family must resolve to a version inside the range.
    Require,
    /// If the family resolves at all, its version must lie outside the range.
    Forbid,
}

/// A request for a package family constrained to a version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    pub family: String,
    pub range: VersionRange,
    pub kind: RequestKind,
}

impl PackageRequest {
    pub fn require(family: impl Into<String>, range: VersionRange) -> Self {
        Self {
            family: family.into(),
            range,
            kind: RequestKind::Require,
        }
    }

    pub fn forbid(family: impl Into<String>, range: VersionRange) -> Self {
        Self {
            family: family.into(),
            range,
            kind: RequestKind::Forbid,
        }
    }

    /// "If present, must be in `range`": a forbid over the complement.
    pub fn weak(family: impl Into<String>, range: &VersionRange) -> Self {
        Self::forbid(family, range.inverse())
    }

    pub fn exact(family: impl Into<String>, version: Version) -> Self {
        Self::require(family, VersionRange::exact(version))
    }

    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RequestError::Empty);
        }

        let (weak, anti, body) = if let Some(rest) = trimmed.strip_prefix('~') {
            (true, false, rest)
        } else if let Some(rest) = trimmed.strip_prefix('!') {
            (false, true, rest)
        } else {
            (false, false, trimmed)
        };

        let (family, range_text) = body.split_once('-').unwrap_or((body, ""));
        if family.is_empty()
            || !family
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RequestError::InvalidFamily {
                input: input.to_string(),
            });
        }

        let range = VersionRange::parse(range_text).map_err(|source| RequestError::Version {
            input: input.to_string(),
            source,
        })?;

        Ok(match (weak, anti) {
            (true, _) => Self::weak(family, &range),
            (_, true) => Self::forbid(family, range),
            _ => Self::require(family, range),
        })
    }

    pub fn is_anti(&self) -> bool {
        self.kind == RequestKind::Forbid
    }

    /// `family-range` without the sigil.
    pub fn short_name(&self) -> String {
        if self.range.is_any() {
            self.family.clone()
        } else {
            format!("{}-{}", self.family, self.range)
        }
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anti() {
            f.write_str("!")?;
        }
        f.write_str(&self.short_name())
    }
}

impl FromStr for PackageRequest {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PackageRequest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a list of request strings, stopping at the first invalid one.
pub fn parse_requests<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PackageRequest>, RequestError> {
    inputs
        .iter()
        .map(|s| PackageRequest::parse(s.as_ref()))
        .collect()
}

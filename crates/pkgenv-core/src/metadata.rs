//! Package metadata resources (`package.toml`).
//!
//! The resolver only consumes request strings from a resource; command
//! templates are carried through untouched.
//!
//! ```toml
//! requires = ["python-2.6+", "!foo-3"]
//! build_requires = ["cmake-3+"]
//! variants = [["python-2.6"], ["python-2.7"]]
//! commands = ["export PATH=$PATH:!ROOT!/bin"]
//! ```

use serde::{Deserialize, Serialize};

use crate::request::{parse_requests, PackageRequest, RequestError};

/// File name of the metadata resource inside a version directory.
pub const METADATA_FILE: &str = "package.toml";

/// Parsed metadata for one exact package version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default, alias = "build-requires")]
    pub build_requires: Vec<String>,

    #[serde(default)]
    pub variants: Vec<Vec<String>>,

    #[serde(default)]
    pub commands: Vec<String>,
}

impl PackageMetadata {
    /// Parse a metadata resource from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Runtime requirements, plus build-only requirements when `build` is set.
    pub fn requirements(&self, build: bool) -> Result<Vec<PackageRequest>, RequestError> {
        let mut reqs = parse_requests(&self.requires)?;
        if build {
            reqs.extend(parse_requests(&self.build_requires)?);
        }
        Ok(reqs)
    }

    /// Each declared variant as a list of sibling requests.
    pub fn variant_requests(&self) -> Result<Vec<Vec<PackageRequest>>, RequestError> {
        self.variants.iter().map(|v| parse_requests(v)).collect()
    }

    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }
}

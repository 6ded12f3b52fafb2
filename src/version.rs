//! A dotted, arbitrary-precision version number with zero-extended comparison.
//!
//! Unlike [`semver`](https://docs.rs/semver), a [`Version`] here is an opaque sequence of
//! numeric components. `1.0` and `1.0.0` compare equal, and there is no notion of
//! major/minor/patch or pre-release metadata -- that richness is not part of this system's
//! contract.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing a [`Version`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,
    #[error("invalid version component `{0}`")]
    InvalidComponent(String),
}

/// A dotted-numeric version, e.g. `1.0.8` or `0.99`.
///
/// Comparison is component-wise with zero-extension: shorter versions are padded with
/// trailing zero components so that `1.0 == 1.0.0` and `1.0 < 1.0.1`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(Vec<u64>);

impl Version {
    /// Parses a dotted-numeric version string such as `"1.0.8"`.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        s.parse()
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }

    fn component_len(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let parts = s
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionError::InvalidComponent(part.to_owned()))
            })
            .collect::<Result<Vec<u64>, VersionError>>()?;
        Ok(Version(parts))
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.component_len().max(other.component_len());
        for i in 0..len {
            let ord = self.component(i).cmp(&other.component(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Parses a dotted-numeric version string. Exposed as a free function to mirror the
/// `parse_version` helper the rest of this system's specification was distilled from.
pub fn parse_version(s: &str) -> Result<Version, VersionError> {
    Version::parse(s)
}

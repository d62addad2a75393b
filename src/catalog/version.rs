//! Ordering for Unity editor version strings
//!
//! Unity versions look like `2017.3.0f3`: dotted numbers, then a release
//! qualifier letter (`a`, `b`, `f`, `p`) and a revision. The qualifier
//! becomes an extra numeric component equal to its character code, so
//! `2017.1.1f1` orders as `2017.1.1.102.1`: after `2017.1.1` and before
//! `2017.1.2`, with alpha < beta < final < patch releases.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Errors during version parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Nothing to parse
    Empty,
    /// Invalid version string (e.g., "2017..1", "v2017")
    InvalidVersion { value: String, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::Empty => write!(f, "empty version string"),
            VersionError::InvalidVersion { value, reason } => {
                write!(f, "invalid version '{}': {}", value, reason)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// A parsed tool version, compared component by component.
#[derive(Debug, Clone)]
pub struct UnityVersion {
    raw: String,
    components: Vec<u64>,
}

impl UnityVersion {
    /// Parse a version string.
    ///
    /// # Examples
    ///
    /// ```
    /// use xcode_embed::catalog::version::UnityVersion;
    ///
    /// let final_release = UnityVersion::parse("2017.1.1f1").unwrap();
    /// assert!(final_release > UnityVersion::parse("2017.1.1").unwrap());
    /// assert!(final_release < UnityVersion::parse("2017.1.2").unwrap());
    /// assert_eq!(final_release.components(), &[2017, 1, 1, 102, 1]);
    /// ```
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        let invalid = |reason: &str| VersionError::InvalidVersion {
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut components = Vec::new();
        let mut digits = String::new();

        for ch in raw.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
            } else if ch == '.' {
                if digits.is_empty() {
                    return Err(invalid("empty component"));
                }
                components.push(parse_component(&digits).map_err(|_| invalid("component out of range"))?);
                digits.clear();
            } else if ch.is_ascii_alphabetic() {
                if digits.is_empty() {
                    return Err(invalid("qualifier must follow a number"));
                }
                components.push(parse_component(&digits).map_err(|_| invalid("component out of range"))?);
                digits.clear();
                components.push(u64::from(ch as u32));
            } else {
                return Err(invalid(&format!("unexpected character '{ch}'")));
            }
        }

        if !digits.is_empty() {
            components.push(parse_component(&digits).map_err(|_| invalid("component out of range"))?);
        } else if raw.ends_with('.') {
            return Err(invalid("trailing separator"));
        }

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_component(digits: &str) -> Result<u64, std::num::ParseIntError> {
    digits.parse::<u64>()
}

impl PartialEq for UnityVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for UnityVersion {}

impl PartialOrd for UnityVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnityVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl FromStr for UnityVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// When a rule applies, in terms of the reported tool version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Always,
    /// Exactly this version
    Exactly(&'static str),
    /// This version or newer
    AtLeast(&'static str),
}

impl Applicability {
    /// Check `version` against this predicate.
    ///
    /// [`Applicability::Always`] never parses the version, so an
    /// unparsable version only fails version-gated rules.
    pub fn evaluate(&self, version: &str) -> Result<bool, VersionError> {
        match self {
            Applicability::Always => Ok(true),
            Applicability::Exactly(bound) => {
                Ok(UnityVersion::parse(version)? == UnityVersion::parse(bound)?)
            }
            Applicability::AtLeast(bound) => {
                Ok(UnityVersion::parse(version)? >= UnityVersion::parse(bound)?)
            }
        }
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::Always => write!(f, "all versions"),
            Applicability::Exactly(bound) => write!(f, "== {bound}"),
            Applicability::AtLeast(bound) => write!(f, ">= {bound}"),
        }
    }
}

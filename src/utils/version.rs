//! Dotted version strings and comparison

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("non-numeric version segment '{0}'")]
    InvalidSegment(String),
}

/// A dotted-numeric version such as "2.0.9" or "1.0.1.0".
///
/// Segments are compared left to right as integers; missing trailing
/// segments compare as zero, so "2.0" == "2.0.0.0".
#[derive(Debug, Clone)]
pub struct Version {
    segments: Vec<u64>,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let segments = s
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionError::InvalidSegment(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns true iff version `a` is strictly greater than version `b`.
///
/// Malformed versions are a hard error rather than silently comparing as
/// zero: a corrupt persisted version marker must not select a wrong set of
/// migration steps.
pub fn is_greater_version(a: &str, b: &str) -> Result<bool, VersionError> {
    let a: Version = a.parse()?;
    let b: Version = b.parse()?;
    Ok(a > b)
}

//! Client version comparison
//!
//! Versions are compared on up to four dot-separated numeric segments.
//! Missing trailing segments count as zero, so "2.1" and "2.1.0.0" are equal.
//! Prerelease and build suffixes (`-beta.1`, `+sha`) do not take part in ordering.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::str::FromStr;

/// Grammar a version must match before it is persisted on an entity.
pub static SEMVER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d+\.\d+\.\d+)(-([0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*))?(\+([0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*))?$",
    )
    .unwrap()
});

/// Maximum number of segments taken into account when ordering.
pub const SEGMENTS: usize = 4;

/// Check a version string against the semantic version grammar.
pub fn is_valid_semver(version: &str) -> bool {
    SEMVER_REGEX.is_match(version)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Nothing to parse
    Empty,
    /// A segment is empty or contains something other than digits
    InvalidSegment(String),
    /// More than four numeric segments
    TooManySegments(String),
}

impl std::fmt::Display for VersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionError::Empty => write!(f, "Version is empty"),
            VersionError::InvalidSegment(v) => write!(f, "Invalid version segment in {:?}", v),
            VersionError::TooManySegments(v) => {
                write!(f, "Version {:?} has more than {} segments", v, SEGMENTS)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Numeric, zero-padded form of a client version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientVersion([u32; SEGMENTS]);

impl ClientVersion {
    pub fn segments(&self) -> [u32; SEGMENTS] {
        self.0
    }
}

impl FromStr for ClientVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let core = trimmed
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or_default();

        if core.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut segments = [0u32; SEGMENTS];
        for (i, part) in core.split('.').enumerate() {
            if i >= SEGMENTS {
                return Err(VersionError::TooManySegments(s.to_owned()));
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidSegment(s.to_owned()));
            }
            segments[i] = part
                .parse()
                .map_err(|_| VersionError::InvalidSegment(s.to_owned()))?;
        }

        Ok(ClientVersion(segments))
    }
}

impl std::fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// Compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let a: ClientVersion = a.parse()?;
    let b: ClientVersion = b.parse()?;
    Ok(a.cmp(&b))
}

/// Version gate: the reported version is at least the minimum.
pub fn has_sufficient_version(required: &str, minimum: &str) -> Result<bool, VersionError> {
    Ok(compare_versions(required, minimum)? != Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ordering() {
        assert_eq!(compare_versions("2.1.0", "2.0.9"), Ok(Ordering::Greater));
        assert_eq!(compare_versions("1.9.9", "2.0.0"), Ok(Ordering::Less));
        assert_eq!(compare_versions("2.0", "2.0.0.0"), Ok(Ordering::Equal));
    }

    #[test]
    fn test_compare_is_numeric_not_lexical() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ok(Ordering::Greater));
        assert_eq!(compare_versions("10", "9.9.9.9"), Ok(Ordering::Greater));
    }

    #[test]
    fn test_fourth_segment_counts() {
        assert_eq!(compare_versions("3.0.0.1", "3.0.0"), Ok(Ordering::Greater));
    }

    #[test]
    fn test_suffixes_are_ignored() {
        assert_eq!(compare_versions("3.0.0-beta.2", "3.0.0"), Ok(Ordering::Equal));
        assert_eq!(compare_versions("3.0.1+build.7", "3.0.0"), Ok(Ordering::Greater));
    }

    #[test]
    fn test_malformed_versions() {
        assert_eq!("".parse::<ClientVersion>(), Err(VersionError::Empty));
        assert!(matches!(
            "1..2".parse::<ClientVersion>(),
            Err(VersionError::InvalidSegment(_))
        ));
        assert!(matches!(
            "1.a.2".parse::<ClientVersion>(),
            Err(VersionError::InvalidSegment(_))
        ));
        assert!(matches!(
            "1.2.3.4.5".parse::<ClientVersion>(),
            Err(VersionError::TooManySegments(_))
        ));
        assert!(compare_versions("abc", "1.0.0").is_err());
    }

    #[test]
    fn test_version_gate() {
        assert_eq!(has_sufficient_version("3.1.0", "3.0.0"), Ok(true));
        assert_eq!(has_sufficient_version("3.0.0", "3.0.0"), Ok(true));
        assert_eq!(has_sufficient_version("2.9.0", "3.0.0"), Ok(false));
    }

    #[test]
    fn test_semver_grammar() {
        assert!(is_valid_semver("1.2.3"));
        assert!(is_valid_semver("1.2.3-rc.1"));
        assert!(is_valid_semver("1.2.3+20240101"));
        assert!(!is_valid_semver("1.2"));
        assert!(!is_valid_semver("1.2.3.4"));
        assert!(!is_valid_semver("v1.2.3"));
        assert!(!is_valid_semver(""));
    }

    #[test]
    fn test_display_pads_segments() {
        let v: ClientVersion = "2.1".parse().unwrap();
        assert_eq!(v.to_string(), "2.1.0.0");
        assert_eq!(v.segments(), [2, 1, 0, 0]);
    }
}

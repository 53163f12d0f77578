//! Version and build-number validation.
//!
//! A marketing version is two or three dot-separated runs of ASCII digits
//! (`1.4`, `1.4.0`). A build number is a six digit reverse-date stamp
//! (`yymmdd`, e.g. `231005`).

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+(\.[0-9]+)?$").expect("valid version regex"));

static BUILD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("valid build regex"));

/// Example shown to the user when a version is rejected.
pub const VERSION_HINT: &str = "expected form 1.4.0";

/// Example shown to the user when a build number is rejected.
pub const BUILD_HINT: &str = "use reverse date format yymmdd, e.g. 231005";

/// Returns `true` when `s` is a 2 or 3 component numeric version whose
/// components each fit a `u64`.
pub fn validate_version(s: &str) -> bool {
    VERSION_PATTERN.is_match(s) && s.split('.').all(|part| part.parse::<u64>().is_ok())
}

/// Returns `true` when `s` is exactly six ASCII digits.
pub fn validate_build(s: &str) -> bool {
    BUILD_PATTERN.is_match(s)
}

/// Reverse-date build stamp (`yymmdd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStamp(NaiveDate);

impl BuildStamp {
    /// Stamp for the current local date.
    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    /// Stamp for an arbitrary date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl std::fmt::Display for BuildStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%y%m%d"))
    }
}

/// Parses a validated version into a [`semver::Version`], padding a missing
/// patch component with zero. Returns `None` for anything that does not pass
/// [`validate_version`] or overflows.
pub fn to_semver(s: &str) -> Option<semver::Version> {
    if !validate_version(s) {
        return None;
    }
    let mut parts = s.split('.').map(|p| p.parse::<u64>());
    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = match parts.next() {
        Some(p) => p.ok()?,
        None => 0,
    };
    Some(semver::Version::new(major, minor, patch))
}

/// Returns `true` when `next` sorts strictly below `current`.
///
/// Unparseable inputs never count as a regression.
pub fn is_regression(current: &str, next: &str) -> bool {
    match (to_semver(current), to_semver(next)) {
        (Some(current), Some(next)) => next < current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_two_and_three_components() {
        for v in ["1.4", "1.4.0", "0.0", "10.20.30", "007.1"] {
            assert!(validate_version(v), "{v} should be valid");
        }
    }

    #[test]
    fn rejects_other_shapes() {
        for v in [
            "", "1", "1.2.3.4", "1..2", ".1.2", "1.2.", "a.b", "1.2.x", "+1.2", "-1.2", " 1.2",
            "1.2 ", "1. 2", "1.٣", "99999999999999999999.0.0", "1.18446744073709551616",
        ] {
            assert!(!validate_version(v), "{v:?} should be invalid");
        }
    }

    #[test]
    fn build_must_be_six_ascii_digits() {
        assert!(validate_build("231005"));
        assert!(validate_build("000000"));
        assert!(!validate_build(""));
        assert!(!validate_build("23100"));
        assert!(!validate_build("2310051"));
        assert!(!validate_build("23100a"));
        assert!(!validate_build("+23100"));
        assert!(!validate_build("٢٣١٠٠٥"));
    }

    #[test]
    fn scenario_a_inputs_are_valid() {
        assert!(validate_version("1.4.0"));
        assert!(validate_build("231005"));
    }

    #[test]
    fn scenario_b_build_is_invalid() {
        assert!(validate_version("1.4"));
        assert!(!validate_build("23100"));
    }

    #[test]
    fn build_stamp_formats_as_yymmdd() {
        let date = NaiveDate::from_ymd_opt(2023, 10, 5).unwrap();
        let stamp = BuildStamp::from_date(date).to_string();
        assert_eq!(stamp, "231005");
        assert!(validate_build(&stamp));
        assert!(validate_build(&BuildStamp::today().to_string()));
    }

    #[test]
    fn regression_pads_missing_patch() {
        assert!(is_regression("1.4.1", "1.4"));
        assert!(!is_regression("1.4", "1.4.0"));
        assert!(!is_regression("1.4.0", "1.10.0"));
        assert!(!is_regression("garbage", "1.0.0"));
    }

    #[test]
    fn every_valid_version_converts_to_semver() {
        for v in ["1.4", "1.4.0", "18446744073709551615.0", "007.1"] {
            assert!(validate_version(v));
            assert!(to_semver(v).is_some(), "{v} should convert");
        }
        assert!(!validate_version("18446744073709551616.0"));
    }
}

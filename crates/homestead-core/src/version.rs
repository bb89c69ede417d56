//! Version ordering for package identifiers
//!
//! Package versions are upstream version strings, so they are not always
//! semver. Semver is used when both sides parse; otherwise versions are
//! compared segment by segment.

use semver::Version;
use std::cmp::Ordering;

/// Compare two version strings by recency (`Greater` means `a` is newer)
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    if let (Ok(va), Ok(vb)) = (Version::parse(a), Version::parse(b)) {
        return va.cmp(&vb);
    }

    let (a_base, a_ext) = split_extension(a);
    let (b_base, b_ext) = split_extension(b);

    match segments_cmp(a_base, b_base) {
        Ordering::Equal => {}
        other => return other,
    }

    match (a_ext, b_ext) {
        (None, None) => Ordering::Equal,
        // A pre-release style extension sorts before the plain version
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(ea), Some(eb)) => segments_cmp(ea, eb),
    }
}

/// Compare two release timestamps
pub fn release_cmp(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn split_extension(version: &str) -> (&str, Option<&str>) {
    match version.split_once('-') {
        Some((base, ext)) => (base, Some(ext)),
        None => (version, None),
    }
}

fn segments_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => match segment_cmp(l, r) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

fn segment_cmp(a: &str, b: &str) -> Ordering {
    let a_numeric = !a.is_empty() && a.bytes().all(|c| c.is_ascii_digit());
    let b_numeric = !b.is_empty() && b.bytes().all(|c| c.is_ascii_digit());

    match (a_numeric, b_numeric) {
        (true, true) => numeric_cmp(a, b),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Numeric comparison without parsing, so long segments cannot overflow
fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semver_ordering() {
        assert_eq!(version_cmp("1.2.3", "1.10.0"), Ordering::Less);
        assert_eq!(version_cmp("2.0.0", "2.0.0-rc.1"), Ordering::Greater);
        assert_eq!(version_cmp("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_non_semver_numeric_segments() {
        assert_eq!(version_cmp("1.2", "1.10"), Ordering::Less);
        assert_eq!(version_cmp("2.27", "2.9"), Ordering::Greater);
        assert_eq!(version_cmp("1.0.0.1", "1.0.0"), Ordering::Greater);
        assert_eq!(version_cmp("007", "7"), Ordering::Equal);
    }

    #[test]
    fn test_long_numeric_segments_do_not_overflow() {
        assert_eq!(
            version_cmp("1.99999999999999999999999", "1.100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn test_extension_sorts_before_plain() {
        assert_eq!(version_cmp("1.2-beta", "1.2"), Ordering::Less);
        assert_eq!(version_cmp("1.2-beta", "1.2-alpha"), Ordering::Greater);
        assert_eq!(version_cmp("1.3-beta", "1.2"), Ordering::Greater);
    }

    #[test]
    fn test_alpha_segments() {
        assert_eq!(version_cmp("1.2.a", "1.2.b"), Ordering::Less);
        assert_eq!(version_cmp("1.2.10", "1.2.b"), Ordering::Greater);
    }

    #[test]
    fn test_release_cmp() {
        assert_eq!(
            release_cmp("20240101120000", "20231231235959"),
            Ordering::Greater
        );
        assert_eq!(
            release_cmp("20240101120000", "20240101120000"),
            Ordering::Equal
        );
    }
}

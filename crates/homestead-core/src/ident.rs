//! Package identifiers
//!
//! A package is identified by `origin/name/version/release`. Any prefix of at
//! least two components is a valid *partial* identifier and resolves to the
//! latest release that satisfies it.
//!
//! ```
//! use homestead_core::PackageIdent;
//!
//! let partial: PackageIdent = "core/redis".parse().unwrap();
//! let full: PackageIdent = "core/redis/7.2.4/20240101120000".parse().unwrap();
//!
//! assert!(!partial.is_fully_qualified());
//! assert!(partial.satisfies(&full));
//! ```

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::target::PackageTarget;
use crate::version::{release_cmp, version_cmp};

static ORIGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static regex"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.+-]*$").expect("static regex"));
static RELEASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{14}$").expect("static regex"));

/// File extension of signed package artifacts
pub const ARTIFACT_EXTENSION: &str = "hpkg";

/// A full or partial package identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdent {
    pub origin: String,
    pub name: String,
    pub version: Option<String>,
    pub release: Option<String>,
}

impl PackageIdent {
    /// Build an identifier from parts, validating each present component
    pub fn new(
        origin: impl Into<String>,
        name: impl Into<String>,
        version: Option<String>,
        release: Option<String>,
    ) -> Result<Self> {
        let ident = Self {
            origin: origin.into(),
            name: name.into(),
            version,
            release,
        };
        ident.validate()?;
        Ok(ident)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidIdent {
            ident: self.to_string(),
            reason: reason.to_string(),
        };

        if self.release.is_some() && self.version.is_none() {
            return Err(invalid("a release requires a version"));
        }
        validate_origin(&self.origin).map_err(|_| {
            invalid("origin must be lowercase alphanumerics, '-' or '_'")
        })?;
        if !NAME_RE.is_match(&self.name) {
            return Err(invalid(
                "name must be alphanumerics, '_', '-', '.' or '+'",
            ));
        }
        if let Some(version) = &self.version {
            if version.is_empty()
                || version.contains('/')
                || version.chars().any(|c| c.is_whitespace())
            {
                return Err(invalid(
                    "version must be non-empty and contain no whitespace or '/'",
                ));
            }
        }
        if let Some(release) = &self.release {
            if !RELEASE_RE.is_match(release) {
                return Err(invalid("release must be a 14 digit timestamp (YYYYMMDDhhmmss)"));
            }
        }
        Ok(())
    }

    /// True when both version and release are present
    pub fn is_fully_qualified(&self) -> bool {
        self.version.is_some() && self.release.is_some()
    }

    /// Fail unless the identifier is fully qualified
    pub fn require_fully_qualified(&self) -> Result<()> {
        if self.is_fully_qualified() {
            Ok(())
        } else {
            Err(CoreError::NotFullyQualified {
                ident: self.to_string(),
            })
        }
    }

    /// Whether `candidate` matches every component present in `self`
    pub fn satisfies(&self, candidate: &PackageIdent) -> bool {
        if self.origin != candidate.origin || self.name != candidate.name {
            return false;
        }
        if let Some(version) = &self.version {
            if candidate.version.as_ref() != Some(version) {
                return false;
            }
        }
        if let Some(release) = &self.release {
            if candidate.release.as_ref() != Some(release) {
                return false;
            }
        }
        true
    }

    /// Identifier without version and release (`origin/name`)
    pub fn short(&self) -> PackageIdent {
        PackageIdent {
            origin: self.origin.clone(),
            name: self.name.clone(),
            version: None,
            release: None,
        }
    }

    /// Same identifier with a new release timestamp
    pub fn with_release(&self, release: impl Into<String>) -> Result<PackageIdent> {
        PackageIdent::new(
            self.origin.clone(),
            self.name.clone(),
            self.version.clone(),
            Some(release.into()),
        )
    }

    /// Recency ordering between two identifiers of the same package
    ///
    /// Missing components sort lowest.
    pub fn recency_cmp(&self, other: &PackageIdent) -> Ordering {
        let version = match (&self.version, &other.version) {
            (Some(a), Some(b)) => version_cmp(a, b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        version.then_with(|| match (&self.release, &other.release) {
            (Some(a), Some(b)) => release_cmp(a, b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        })
    }

    /// Artifact file name for a fully qualified identifier
    pub fn archive_name(&self, target: PackageTarget) -> Result<String> {
        self.require_fully_qualified()?;
        Ok(format!(
            "{}-{}.{}",
            self.dashed(),
            target,
            ARTIFACT_EXTENSION
        ))
    }

    /// Components joined with `-`, used for file names
    pub fn dashed(&self) -> String {
        self.iter().collect::<Vec<_>>().join("-")
    }

    /// Iterate over the present components
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.origin.as_str()),
            Some(self.name.as_str()),
            self.version.as_deref(),
            self.release.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

impl fmt::Display for PackageIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "/{}", version)?;
            if let Some(release) = &self.release {
                write!(f, "/{}", release)?;
            }
        }
        Ok(())
    }
}

impl FromStr for PackageIdent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidIdent {
                ident: s.to_string(),
                reason: "empty component".to_string(),
            });
        }

        match parts.as_slice() {
            [origin, name] => PackageIdent::new(*origin, *name, None, None),
            [origin, name, version] => {
                PackageIdent::new(*origin, *name, Some(version.to_string()), None)
            }
            [origin, name, version, release] => PackageIdent::new(
                *origin,
                *name,
                Some(version.to_string()),
                Some(release.to_string()),
            ),
            _ => Err(CoreError::InvalidIdent {
                ident: s.to_string(),
                reason: "expected origin/name[/version[/release]]".to_string(),
            }),
        }
    }
}

impl Serialize for PackageIdent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageIdent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Validate an origin name
pub fn validate_origin(origin: &str) -> Result<()> {
    if ORIGIN_RE.is_match(origin) && origin.len() <= 255 {
        Ok(())
    } else {
        Err(CoreError::InvalidIdent {
            ident: origin.to_string(),
            reason: "origin must be lowercase alphanumerics, '-' or '_'".to_string(),
        })
    }
}

/// Release timestamps (`YYYYMMDDhhmmss`, UTC)
pub struct Release;

impl Release {
    /// Release string for the current instant
    pub fn now() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }
}

/// Pick the most recent identifier satisfying `partial`
pub fn latest_satisfying<'a, I>(partial: &PackageIdent, candidates: I) -> Option<&'a PackageIdent>
where
    I: IntoIterator<Item = &'a PackageIdent>,
{
    candidates
        .into_iter()
        .filter(|c| c.is_fully_qualified() && partial.satisfies(c))
        .max_by(|a, b| a.recency_cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> PackageIdent {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_all_forms() {
        let two = ident("core/redis");
        assert_eq!(two.origin, "core");
        assert_eq!(two.name, "redis");
        assert!(two.version.is_none());

        let three = ident("core/redis/7.2.4");
        assert_eq!(three.version.as_deref(), Some("7.2.4"));
        assert!(three.release.is_none());

        let four = ident("core/redis/7.2.4/20240101120000");
        assert!(four.is_fully_qualified());
        assert_eq!(four.to_string(), "core/redis/7.2.4/20240101120000");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!("core".parse::<PackageIdent>().is_err());
        assert!("core/redis/1/20240101120000/extra".parse::<PackageIdent>().is_err());
        assert!("core//1.0".parse::<PackageIdent>().is_err());
        assert!("Core/redis".parse::<PackageIdent>().is_err());
        assert!("core/redis/1.0/2024".parse::<PackageIdent>().is_err());
        assert!("core/re dis".parse::<PackageIdent>().is_err());
    }

    #[test]
    fn test_new_rejects_slash_in_version() {
        let err = PackageIdent::new("core", "redis", Some("1.0/../../x".to_string()), None);
        assert!(matches!(err, Err(CoreError::InvalidIdent { .. })));
        assert!(PackageIdent::new("core", "redis", Some("1.0".to_string()), None).is_ok());
    }

    #[test]
    fn test_recency_missing_components_sort_lowest() {
        let partial = ident("core/redis");
        let versioned = ident("core/redis/1.0");
        let full = ident("core/redis/1.0/20240101120000");

        assert_eq!(versioned.recency_cmp(&partial), Ordering::Greater);
        assert_eq!(partial.recency_cmp(&versioned), Ordering::Less);
        assert_eq!(full.recency_cmp(&versioned), Ordering::Greater);
        assert_eq!(versioned.recency_cmp(&full), Ordering::Less);
        assert_eq!(partial.recency_cmp(&ident("core/redis")), Ordering::Equal);
    }

    #[test]
    fn test_satisfies() {
        let full = ident("core/redis/7.2.4/20240101120000");
        assert!(ident("core/redis").satisfies(&full));
        assert!(ident("core/redis/7.2.4").satisfies(&full));
        assert!(full.satisfies(&full));
        assert!(!ident("core/redis/7.2.3").satisfies(&full));
        assert!(!ident("acme/redis").satisfies(&full));
    }

    #[test]
    fn test_latest_satisfying() {
        let candidates = vec![
            ident("core/redis/7.2.4/20240101120000"),
            ident("core/redis/7.10.0/20230101120000"),
            ident("core/redis/7.10.0/20230601120000"),
            ident("core/nginx/9.0.0/20250101120000"),
        ];

        let latest = latest_satisfying(&ident("core/redis"), &candidates).unwrap();
        assert_eq!(latest.to_string(), "core/redis/7.10.0/20230601120000");

        let pinned = latest_satisfying(&ident("core/redis/7.2.4"), &candidates).unwrap();
        assert_eq!(pinned.to_string(), "core/redis/7.2.4/20240101120000");

        assert!(latest_satisfying(&ident("core/postgres"), &candidates).is_none());
    }

    #[test]
    fn test_archive_name() {
        let full = ident("core/redis/7.2.4/20240101120000");
        assert_eq!(
            full.archive_name(PackageTarget::X86_64Linux).unwrap(),
            "core-redis-7.2.4-20240101120000-x86_64-linux.hpkg"
        );
        assert!(ident("core/redis").archive_name(PackageTarget::X86_64Linux).is_err());
    }

    #[test]
    fn test_release_now_is_valid() {
        let release = Release::now();
        assert_eq!(release.len(), 14);
        assert!(ident("core/redis/1.0").with_release(release).is_ok());
    }

    #[test]
    fn test_serde_as_string() {
        let full = ident("core/redis/7.2.4/20240101120000");
        let json = serde_json::to_string(&full).unwrap();
        assert_eq!(json, "\"core/redis/7.2.4/20240101120000\"");
        let back: PackageIdent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, full);
    }
}

//! Secret names

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::error::VaultError;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// Prefix reserved for variables set by the build environment
pub const RESERVED_PREFIX: &str = "HS_";

const MAX_NAME_LEN: usize = 255;

/// A validated secret name, usable as an environment variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretName(String);

impl SecretName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SecretName {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| VaultError::InvalidSecretName {
            name: s.to_string(),
            reason: reason.to_string(),
        };

        if s.len() > MAX_NAME_LEN {
            return Err(invalid("must be at most 255 characters"));
        }
        if !NAME_RE.is_match(s) {
            return Err(invalid(
                "must start with a letter or '_' and contain only letters, digits and '_'",
            ));
        }
        if s.starts_with(RESERVED_PREFIX) {
            return Err(invalid("the HS_ prefix is reserved for the build environment"));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["AWS_ACCESS_KEY_ID", "_private", "token2", "a"] {
            assert_eq!(name.parse::<SecretName>().unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "2FAST", "with-dash", "with space", "HS_PKG_NAME"] {
            assert!(name.parse::<SecretName>().is_err(), "{} should be rejected", name);
        }
        assert!("A".repeat(256).parse::<SecretName>().is_err());
        assert!("A".repeat(255).parse::<SecretName>().is_ok());
    }
}

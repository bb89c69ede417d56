//! Release channels

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

static CHANNEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static regex"));

/// A named channel packages can be promoted into
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelIdent(String);

impl ChannelIdent {
    pub const STABLE: &'static str = "stable";
    pub const UNSTABLE: &'static str = "unstable";

    pub fn stable() -> Self {
        Self(Self::STABLE.to_string())
    }

    /// Channel every upload lands in
    pub fn unstable() -> Self {
        Self(Self::UNSTABLE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `stable` and `unstable` always exist and are never created on demand
    pub fn is_builtin(&self) -> bool {
        self.0 == Self::STABLE || self.0 == Self::UNSTABLE
    }
}

impl fmt::Display for ChannelIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelIdent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if CHANNEL_RE.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::InvalidChannel {
                name: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for ChannelIdent {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelIdent> for String {
    fn from(value: ChannelIdent) -> Self {
        value.0
    }
}

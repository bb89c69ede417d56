//! Package targets (architecture + platform)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Platform a package was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageTarget {
    #[serde(rename = "x86_64-linux")]
    X86_64Linux,
    #[serde(rename = "aarch64-linux")]
    Aarch64Linux,
    #[serde(rename = "x86_64-windows")]
    X86_64Windows,
    #[serde(rename = "x86_64-darwin")]
    X86_64Darwin,
    #[serde(rename = "aarch64-darwin")]
    Aarch64Darwin,
}

impl PackageTarget {
    pub const ALL: [PackageTarget; 5] = [
        Self::X86_64Linux,
        Self::Aarch64Linux,
        Self::X86_64Windows,
        Self::X86_64Darwin,
        Self::Aarch64Darwin,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64Linux => "x86_64-linux",
            Self::Aarch64Linux => "aarch64-linux",
            Self::X86_64Windows => "x86_64-windows",
            Self::X86_64Darwin => "x86_64-darwin",
            Self::Aarch64Darwin => "aarch64-darwin",
        }
    }

    /// Target of the running host, falling back to `x86_64-linux`
    pub fn active() -> Self {
        let host = format!("{}-{}", std::env::consts::ARCH, host_os());
        host.parse().unwrap_or(Self::X86_64Linux)
    }
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

impl fmt::Display for PackageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageTarget {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::InvalidTarget {
                target: s.to_string(),
            })
    }
}

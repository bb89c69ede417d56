//! Export formats

use std::fmt;
use std::str::FromStr;

use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Gzipped tarball of the package and its runtime closure
    Tar,
    /// OCI image layout directory
    Oci,
    /// Deployment and Service manifests
    Kubernetes,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Tar, Self::Oci, Self::Kubernetes];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::Oci => "oci",
            Self::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(Self::Tar),
            "oci" | "docker" => Ok(Self::Oci),
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            _ => Err(ExportError::UnknownFormat {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        for format in ExportFormat::ALL {
            assert_eq!(format.to_string().parse::<ExportFormat>().unwrap(), format);
        }
        assert_eq!("k8s".parse::<ExportFormat>().unwrap(), ExportFormat::Kubernetes);
        assert_eq!("Docker".parse::<ExportFormat>().unwrap(), ExportFormat::Oci);
        assert!(matches!(
            "vmdk".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat { .. })
        ));
    }
}

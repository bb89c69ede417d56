//! Build plans (`plan.yaml`)

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::ident::PackageIdent;

/// File name of a plan inside its directory
pub const PLAN_FILE: &str = "plan.yaml";

static ENV_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// Description of how to build one package
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub origin: String,
    pub name: String,
    pub version: String,

    /// Runtime dependencies, partial identifiers allowed
    #[serde(default)]
    pub deps: Vec<String>,

    /// Build-time dependencies, partial identifiers allowed
    #[serde(default)]
    pub build_deps: Vec<String>,

    /// Origin secrets the build requires
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Plain build environment, in declaration order
    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Shell script run with `sh -c`
    pub build: String,

    #[serde(default)]
    pub run: Option<String>,

    #[serde(default)]
    pub exposes: Vec<u16>,
}

/// A plan together with the directory it was loaded from
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: Plan,
    pub root: PathBuf,
}

impl Plan {
    /// Load and validate `plan.yaml` from a plan directory
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<LoadedPlan> {
        let root = dir.as_ref().to_path_buf();
        let plan_file = root.join(PLAN_FILE);
        if !plan_file.exists() {
            return Err(CoreError::PlanNotFound {
                path: plan_file.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(&plan_file)?;
        let plan = Self::from_yaml(&content)?;
        Ok(LoadedPlan { plan, root })
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| CoreError::InvalidPlan { message };

        PackageIdent::new(
            self.origin.clone(),
            self.name.clone(),
            Some(self.version.clone()),
            None,
        )
        .map_err(|e| invalid(e.to_string()))?;

        self.dep_idents()?;
        self.build_dep_idents()?;

        for name in self.secrets.iter().chain(self.env.keys()) {
            if !ENV_NAME_RE.is_match(name) {
                return Err(invalid(format!(
                    "'{}' is not a valid environment variable name",
                    name
                )));
            }
        }
        if self.build.trim().is_empty() {
            return Err(invalid("build script is empty".to_string()));
        }
        Ok(())
    }

    /// Identifier of the package this plan produces for a release
    pub fn ident(&self, release: &str) -> Result<PackageIdent> {
        PackageIdent::new(
            self.origin.clone(),
            self.name.clone(),
            Some(self.version.clone()),
            Some(release.to_string()),
        )
    }

    pub fn dep_idents(&self) -> Result<Vec<PackageIdent>> {
        parse_deps(&self.deps)
    }

    pub fn build_dep_idents(&self) -> Result<Vec<PackageIdent>> {
        parse_deps(&self.build_deps)
    }
}

fn parse_deps(deps: &[String]) -> Result<Vec<PackageIdent>> {
    deps.iter()
        .map(|d| {
            d.parse().map_err(|e: CoreError| CoreError::InvalidPlan {
                message: format!("dependency '{}': {}", d, e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PLAN: &str = r#"
origin: core
name: redis
version: 7.2.4
deps: [core/glibc]
build_deps: [core/gcc/13.2.0]
secrets: [AWS_ACCESS_KEY_ID]
env:
  CFLAGS: "-O2"
  LDFLAGS: "-s"
build: |
  make PREFIX="$HS_PKG_PREFIX" install
run: bin/redis-server
exposes: [6379]
"#;

    #[test]
    fn test_load_plan() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PLAN_FILE), PLAN).unwrap();

        let loaded = Plan::load(temp.path()).unwrap();
        let plan = &loaded.plan;
        assert_eq!(plan.name, "redis");
        assert_eq!(plan.dep_idents().unwrap()[0].to_string(), "core/glibc");
        assert_eq!(
            plan.build_dep_idents().unwrap()[0].version.as_deref(),
            Some("13.2.0")
        );
        let env_keys: Vec<&String> = plan.env.keys().collect();
        assert_eq!(env_keys, vec!["CFLAGS", "LDFLAGS"]);
        assert_eq!(plan.exposes, vec![6379]);
        assert_eq!(loaded.root, temp.path());
    }

    #[test]
    fn test_missing_plan() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Plan::load(temp.path()),
            Err(CoreError::PlanNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_dependency() {
        let yaml = "origin: core\nname: redis\nversion: '1.0'\ndeps: [glibc]\nbuild: make\n";
        assert!(matches!(
            Plan::from_yaml(yaml),
            Err(CoreError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_invalid_secret_name() {
        let yaml = "origin: core\nname: redis\nversion: '1.0'\nsecrets: ['1BAD']\nbuild: make\n";
        assert!(Plan::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_origin() {
        let yaml = "origin: Core\nname: redis\nversion: '1.0'\nbuild: make\n";
        assert!(Plan::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_version_with_slash_rejected() {
        let yaml = "origin: core\nname: redis\nversion: '1.0/../../x'\nbuild: 'true'\n";
        assert!(matches!(
            Plan::from_yaml(yaml),
            Err(CoreError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_ident_for_release() {
        let plan = Plan::from_yaml(PLAN).unwrap();
        let ident = plan.ident("20240101120000").unwrap();
        assert_eq!(ident.to_string(), "core/redis/7.2.4/20240101120000");
    }
}

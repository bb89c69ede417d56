//! Per-invocation settings resolved from flags, environment and config file
//!
//! Precedence: command-line flag, then environment variable (handled by
//! clap), then `config.yaml`, then built-in defaults.

use homestead_core::{ChannelIdent, KeyCache};
use homestead_store::{ArtifactStore, HomesteadConfig};
use homestead_vault::{Authorizer, VaultError};
use std::path::PathBuf;

use crate::GlobalArgs;
use crate::error::{CliError, Result};

pub struct Session {
    config: HomesteadConfig,
    store_path: PathBuf,
    keys: KeyCache,
    non_interactive: bool,
}

impl Session {
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let config = match &global.config {
            Some(path) if path.exists() => HomesteadConfig::load_from(path)?,
            Some(_) => HomesteadConfig::default(),
            None => HomesteadConfig::load()?,
        };

        let store_path = global
            .store
            .clone()
            .unwrap_or_else(|| config.store_path());
        let keys = KeyCache::new(
            global
                .cache_key_path
                .clone()
                .unwrap_or_else(|| config.key_cache_path()),
        );

        tracing::debug!(
            store = %store_path.display(),
            keys = %keys.dir().display(),
            "resolved session paths"
        );
        Ok(Self {
            config,
            store_path,
            keys,
            non_interactive: global.non_interactive,
        })
    }

    pub fn open_store(&self) -> Result<ArtifactStore> {
        Ok(ArtifactStore::open(&self.store_path)?)
    }

    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    /// Origin from `--origin`/`HOMESTEAD_ORIGIN`, falling back to the config
    pub fn origin(&self, flag: Option<String>) -> Result<String> {
        flag.or_else(|| self.config.default_origin.clone())
            .ok_or_else(|| {
                CliError::input_with_help(
                    "No origin given",
                    "Pass --origin, set HOMESTEAD_ORIGIN or default_origin in config.yaml",
                )
            })
    }

    /// Channel from `--channel`, falling back to the config
    pub fn channel(&self, flag: Option<ChannelIdent>) -> Option<ChannelIdent> {
        flag.or_else(|| self.config.default_channel.clone())
    }

    pub fn interactive(&self) -> bool {
        !self.non_interactive
    }

    /// Prompt for a password, twice when `confirm` is set
    ///
    /// Returns `None` in non-interactive mode or when the answer is empty.
    pub fn prompt_password(&self, prompt: &str, confirm: bool) -> Result<Option<String>> {
        if !self.interactive() {
            return Ok(None);
        }

        let password = rpassword::prompt_password(prompt)?;
        if password.is_empty() {
            return Ok(None);
        }
        if confirm {
            let again = rpassword::prompt_password("Confirm password: ")?;
            if again != password {
                return Err(CliError::input("Passwords do not match"));
            }
        }
        Ok(Some(password))
    }
}

/// An auth token is required for the command
pub fn require_token(token: Option<String>) -> Result<String> {
    token.filter(|t| !t.is_empty()).ok_or_else(|| {
        CliError::auth(
            "No auth token given",
            "Pass --auth or set HOMESTEAD_AUTH_TOKEN to the token printed by `homestead origin create`",
        )
    })
}

/// Vault authorization backed by the store's origin tokens
pub struct StoreAuthorizer<'a>(pub &'a ArtifactStore);

impl Authorizer for StoreAuthorizer<'_> {
    fn authorize(&self, origin: &str, token: &str) -> homestead_vault::Result<()> {
        use homestead_store::StoreError;

        self.0.authorize(origin, token).map_err(|e| match e {
            StoreError::OriginNotFound { origin } => VaultError::OriginNotFound { origin },
            StoreError::Unauthorized { origin } => VaultError::Unauthorized { origin },
            other => VaultError::Io(std::io::Error::other(other.to_string())),
        })
    }
}

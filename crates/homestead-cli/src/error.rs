//! CLI error types with exit code handling
//!
//! Every library error is mapped onto a [`CliError`] variant, which decides
//! the process exit code and the help line shown under the report.

use homestead_build::BuildError;
use homestead_core::CoreError;
use homestead_export::ExportError;
use homestead_store::StoreError;
use homestead_vault::VaultError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    #[error("{message}")]
    #[diagnostic(code(homestead::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(homestead::cli::auth))]
    Auth {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(homestead::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(homestead::cli::conflict))]
    Conflict {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(homestead::cli::integrity))]
    Integrity { message: String },

    #[error("{message}")]
    #[diagnostic(code(homestead::cli::build))]
    Build {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(homestead::cli::io))]
    Io { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(homestead::cli::internal))]
    Internal { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::Auth { .. } => exit_codes::AUTH_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Conflict { .. } => exit_codes::CONFLICT,
            CliError::Integrity { .. } => exit_codes::INTEGRITY_ERROR,
            CliError::Build { .. } => exit_codes::BUILD_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn auth(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, help: Option<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            help,
        }
    }

    pub fn conflict(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            help,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::KeyNotFound { origin, .. } => CliError::not_found(
                message,
                Some(format!(
                    "Generate keys with `homestead origin key generate {}`",
                    origin
                )),
            ),
            CoreError::KeyLocked { .. } => CliError::input_with_help(
                message,
                "Run without HOMESTEAD_NONINTERACTIVE to enter the key password",
            ),
            CoreError::PlanNotFound { .. } => CliError::not_found(message, None),
            CoreError::InvalidArtifact { .. }
            | CoreError::InvalidManifest { .. }
            | CoreError::BadSignature { .. } => CliError::integrity(message),
            CoreError::Io(_) | CoreError::Walk(_) => CliError::Io { message },
            _ => CliError::input(message),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::OriginNotFound { origin } => CliError::not_found(
                message,
                Some(format!("Create it with `homestead origin create {}`", origin)),
            ),
            StoreError::Unauthorized { .. } => CliError::auth(
                message,
                "Pass the token printed by `homestead origin create` with --auth or HOMESTEAD_AUTH_TOKEN",
            ),
            StoreError::PackageNotFound { .. } | StoreError::ChannelNotFound { .. } => {
                CliError::not_found(message, None)
            }
            StoreError::MissingDependency { dependency, .. } => CliError::not_found(
                message,
                Some(format!("Upload {} before this package", dependency)),
            ),
            StoreError::OriginExists { .. } | StoreError::PackageExists { .. } => {
                CliError::conflict(message, None)
            }
            StoreError::IntegrityCheckFailed { .. } => CliError::integrity(message),
            StoreError::CannotDemote { .. } | StoreError::InvalidConfig { .. } => {
                CliError::input(message)
            }
            StoreError::Core(e) => e.into(),
            StoreError::Io(_) => CliError::Io { message },
            StoreError::Catalog { .. } | StoreError::Serialization(_) => {
                CliError::internal(message)
            }
        }
    }
}

impl From<VaultError> for CliError {
    fn from(err: VaultError) -> Self {
        let message = err.to_string();
        match err {
            VaultError::InvalidSecretName { .. } | VaultError::KeyMismatch { .. } => {
                CliError::input(message)
            }
            VaultError::SecretExists { name, .. } => CliError::conflict(
                message,
                Some(format!(
                    "Remove the old value with `homestead origin secret delete {}`",
                    name
                )),
            ),
            VaultError::SecretNotFound { .. } => CliError::not_found(message, None),
            VaultError::OriginNotFound { origin } => CliError::not_found(
                message,
                Some(format!("Create it with `homestead origin create {}`", origin)),
            ),
            VaultError::Unauthorized { .. } => CliError::auth(
                message,
                "Pass the origin token with --auth or HOMESTEAD_AUTH_TOKEN",
            ),
            VaultError::Open { .. } => CliError::integrity(message),
            VaultError::Core(e) => e.into(),
            VaultError::Io(_) => CliError::Io { message },
            VaultError::Seal { .. } | VaultError::Serialization(_) => CliError::internal(message),
        }
    }
}

impl From<BuildError> for CliError {
    fn from(err: BuildError) -> Self {
        let message = err.to_string();
        match err {
            BuildError::MissingSecret { name } => CliError::Build {
                message,
                help: Some(format!(
                    "Upload it with `homestead origin secret upload {} <VALUE>`",
                    name
                )),
            },
            BuildError::BuildFailed { .. } => CliError::Build {
                message,
                help: Some("See the build output above".to_string()),
            },
            BuildError::SecretLeaked { .. } => CliError::Build {
                message,
                help: Some("Read secrets from the environment at run time instead".to_string()),
            },
            BuildError::Core(e) => e.into(),
            BuildError::Store(e) => e.into(),
            BuildError::Io(_) | BuildError::Walk(_) => CliError::Io { message },
        }
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        let message = err.to_string();
        match err {
            ExportError::UnknownFormat { .. }
            | ExportError::UnsupportedFormat { .. }
            | ExportError::UnsupportedTarget { .. }
            | ExportError::OutputNotDirectory(_) => CliError::input(message),
            ExportError::Core(e) => e.into(),
            ExportError::Io(_) => CliError::Io { message },
            ExportError::Json(_) | ExportError::Yaml(_) => CliError::internal(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err: CliError = StoreError::Unauthorized {
            origin: "core".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::AUTH_ERROR);

        let err: CliError = StoreError::Core(CoreError::BadSignature {
            signer: "core".to_string(),
            message: "bad".to_string(),
        })
        .into();
        assert_eq!(err.exit_code(), exit_codes::INTEGRITY_ERROR);

        let err: CliError = BuildError::BuildFailed { code: Some(1) }.into();
        assert_eq!(err.exit_code(), exit_codes::BUILD_ERROR);
    }

    #[test]
    fn test_help_names_origin() {
        let err: CliError = CoreError::KeyNotFound {
            origin: "core".to_string(),
            kind: "secret signing".to_string(),
        }
        .into();
        match err {
            CliError::NotFound { help: Some(help), .. } => {
                assert!(help.contains("homestead origin key generate core"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

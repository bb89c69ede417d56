//! Homestead Core - Core types for the Homestead package manager
//!
//! This crate provides the foundational types shared by every Homestead crate:
//! - `PackageIdent`: `origin/name/version/release` identifiers and their partial forms
//! - `PackageTarget` / `ChannelIdent`: build targets and release channels
//! - `KeyCache`: origin signing and encryption keys
//! - `ArtifactBuilder` / `Artifact`: signed `.hpkg` package artifacts
//! - `Manifest`: per-artifact metadata and checksums
//! - `Plan`: build plans loaded from `plan.yaml`

pub mod artifact;
pub mod channel;
pub mod error;
pub mod ident;
pub mod keys;
pub mod manifest;
pub mod plan;
pub mod target;
pub mod version;

pub use artifact::{ARTIFACT_FORMAT, Artifact, ArtifactBuilder, ArtifactFile};
pub use channel::ChannelIdent;
pub use error::{CoreError, Result};
pub use ident::{ARTIFACT_EXTENSION, PackageIdent, Release, latest_satisfying, validate_origin};
pub use keys::{EncryptionKeyPair, KeyCache, SigningKeyPair};
pub use manifest::{FileEntry, Manifest, MismatchedFile, VerificationResult};
pub use plan::{LoadedPlan, PLAN_FILE, Plan};
pub use target::PackageTarget;
pub use version::{release_cmp, version_cmp};

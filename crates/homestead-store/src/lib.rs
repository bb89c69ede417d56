//! Homestead Store - local artifact store
//!
//! This crate provides:
//! - `ArtifactStore`: origins, verified uploads, channel membership and
//!   resolution of partial identifiers to the latest release
//! - `Catalog`: the SQLite index behind the store
//! - `HomesteadConfig`: client configuration file

pub mod catalog;
pub mod config;
pub mod error;
pub mod store;
pub mod suggestions;

pub use catalog::{Catalog, PackageRecord};
pub use config::HomesteadConfig;
pub use error::{Result, StoreError};
pub use store::ArtifactStore;

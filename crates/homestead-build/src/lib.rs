//! Homestead Build - run plans into signed artifacts
//!
//! ```no_run
//! use homestead_build::BuildJob;
//! use homestead_core::KeyCache;
//! use homestead_store::ArtifactStore;
//!
//! # async fn example() -> homestead_build::Result<()> {
//! let store = ArtifactStore::open(ArtifactStore::default_path())?;
//! let keys = KeyCache::new(KeyCache::default_path());
//! let outcome = BuildJob::new("plans/redis", &store, &keys).run().await?;
//! println!("built {}", outcome.ident);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod job;

pub use error::{BuildError, Result};
pub use job::{BuildJob, BuildOutcome, RESULTS_DIR};

//! Verify command - check an artifact's signature and file checksums

use homestead_core::{Artifact, CoreError};
use std::path::Path;

use crate::error::{CliError, Result};
use crate::session::Session;
use crate::ui::{self, Status};
use crate::util::truncate_hash;

pub fn run(session: &Session, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::not_found(
            format!("Artifact not found: {}", path.display()),
            None,
        ));
    }

    let artifact = Artifact::open(path)?;
    ui::status(Status::Verifying, artifact.ident());
    println!();

    ui::heading("Signature check");
    let public_key = session.keys().public_signing_key(artifact.signer())?;
    let result = match artifact.verify(&public_key) {
        Ok(result) => {
            ui::ok(format!("Signed by origin {}", artifact.signer()));
            result
        }
        Err(err @ CoreError::BadSignature { .. }) => {
            ui::fail(format!("Signature does not match origin {}", artifact.signer()));
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    println!();
    ui::heading("Integrity check");
    if !result.valid {
        ui::fail("Checksum verification failed");
        for mismatch in &result.mismatched {
            println!(
                "    - {}: expected {}, got {}",
                mismatch.path,
                truncate_hash(&mismatch.expected, 16),
                truncate_hash(&mismatch.actual, 16)
            );
        }
        for missing in &result.missing {
            println!("    - {}: missing from artifact", missing);
        }
        return Err(CliError::integrity(format!(
            "Integrity check failed for {}",
            artifact.ident()
        )));
    }
    ui::ok(format!(
        "All {} file checksums match",
        artifact.manifest().files.len()
    ));

    println!();
    ui::status(Status::Verified, artifact.ident());
    Ok(())
}

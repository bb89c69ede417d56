//! Info command - show an artifact's manifest

use console::style;
use homestead_core::Artifact;
use serde_json::json;
use std::path::Path;

use crate::error::{CliError, Result};
use crate::ui;
use crate::util::{format_size, join_or_dash, truncate_hash};

pub fn run(path: &Path, json: bool) -> Result<()> {
    let artifact = Artifact::open(path)?;
    let manifest = artifact.manifest();
    let checksum = artifact.checksum()?;
    let size = std::fs::metadata(path)?.len();

    if json {
        let value = json!({
            "ident": manifest.ident.to_string(),
            "target": manifest.target.to_string(),
            "signer": artifact.signer(),
            "created": manifest.created.to_rfc3339(),
            "run": manifest.run,
            "exposes": manifest.exposes,
            "deps": manifest.deps.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "build_deps": manifest.build_deps.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "files": manifest.files.iter().map(|f| json!({ "path": f.path, "sha256": f.sha256 })).collect::<Vec<_>>(),
            "digest": manifest.digest,
            "checksum": checksum,
            "size": size,
        });
        let out = serde_json::to_string_pretty(&value)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", style(&manifest.ident).cyan().bold());
    println!();
    ui::field("Target", manifest.target);
    ui::field("Signed by", artifact.signer());
    ui::field("Created", manifest.created.format("%Y-%m-%d %H:%M:%S UTC"));
    ui::field("Run", manifest.run.as_deref().unwrap_or("-"));
    ui::field("Exposes", join_or_dash(&manifest.exposes));
    ui::field("Deps", join_or_dash(&manifest.deps));
    ui::field("Build deps", join_or_dash(&manifest.build_deps));
    ui::field("Files", manifest.files.len());
    ui::field("Size", format_size(size));
    ui::field("Digest", truncate_hash(&manifest.digest, 16));
    ui::field("Checksum", truncate_hash(&checksum, 16));
    Ok(())
}

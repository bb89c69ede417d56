//! Upload command - import a signed artifact into the store

use homestead_core::Artifact;
use std::path::Path;

use crate::error::Result;
use crate::session::{Session, require_token};
use crate::ui::{self, Status};

pub fn run(session: &Session, path: &Path, token: Option<String>) -> Result<()> {
    let token = require_token(token)?;
    let artifact = Artifact::open(path)?;
    let origin = artifact.ident().origin.clone();

    let mut store = session.open_store()?;
    store.authorize(&origin, &token)?;

    ui::begin(format!("Uploading {}", path.display()));
    ui::status(Status::Uploading, path.display());
    let ident = store.upload(path, session.keys())?;
    ui::status(Status::Uploaded, &ident);
    ui::end(format!("Upload of {} complete.", ident));
    Ok(())
}

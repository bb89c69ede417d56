//! Secret commands - manage origin secrets for build jobs

use console::style;
use homestead_vault::{FileSecretBackend, Vault};

use crate::error::Result;
use crate::session::{Session, StoreAuthorizer, require_token};
use crate::ui::{self, Status};

pub async fn upload(
    session: &Session,
    origin: &str,
    token: Option<String>,
    name: &str,
    value: &str,
) -> Result<()> {
    let token = require_token(token)?;
    let store = session.open_store()?;
    let vault = Vault::new(FileSecretBackend::new(store.root())?, StoreAuthorizer(&store));
    let public_key = session.keys().public_encryption_key(origin)?;

    ui::status(Status::Encrypting, format!("{} for origin {}", name, origin));
    ui::status(Status::Uploading, name);
    vault.upload(origin, &token, name, value, &public_key).await?;
    ui::status(Status::Uploaded, name);
    Ok(())
}

pub async fn list(session: &Session, origin: &str, token: Option<String>) -> Result<()> {
    let token = require_token(token)?;
    let store = session.open_store()?;
    let vault = Vault::new(FileSecretBackend::new(store.root())?, StoreAuthorizer(&store));

    let secrets = vault.list(origin, &token).await?;
    if secrets.is_empty() {
        println!("No secrets for origin {}", origin);
        return Ok(());
    }

    println!("{}", style(format!("Secrets for {}", origin)).bold());
    for secret in secrets {
        println!(
            "  {:<32} {}",
            secret.name,
            style(secret.created.format("%Y-%m-%d %H:%M:%S UTC")).dim()
        );
    }
    Ok(())
}

pub async fn delete(
    session: &Session,
    origin: &str,
    token: Option<String>,
    name: &str,
) -> Result<()> {
    let token = require_token(token)?;
    let store = session.open_store()?;
    let vault = Vault::new(FileSecretBackend::new(store.root())?, StoreAuthorizer(&store));

    ui::status(Status::Deleting, format!("{} from origin {}", name, origin));
    vault.delete(origin, &token, name).await?;
    ui::status(Status::Deleted, name);
    Ok(())
}

//! Origin commands - register origins and generate their keys

use console::style;
use homestead_core::{EncryptionKeyPair, SigningKeyPair, validate_origin};

use crate::error::{CliError, Result};
use crate::session::Session;
use crate::ui::{self, Status};

pub fn create(session: &Session, origin: &str) -> Result<()> {
    validate_origin(origin)?;
    let store = session.open_store()?;

    ui::status(Status::Creating, format!("origin {}", origin));
    let token = store.create_origin(origin)?;
    ui::status(Status::Created, format!("origin {}", origin));
    println!();

    println!("{}", style("Auth token (shown once, keep it safe):").bold());
    println!("HOMESTEAD_AUTH_TOKEN={}", token);

    if !session.keys().has_signing_key(origin) {
        println!();
        println!("{}:", style("To generate origin keys").bold());
        println!("  homestead origin key generate {}", origin);
    }
    Ok(())
}

pub fn generate_keys(session: &Session, origin: &str, no_password: bool, force: bool) -> Result<()> {
    validate_origin(origin)?;
    let keys = session.keys();

    if !force && keys.has_signing_key(origin) {
        return Err(CliError::conflict(
            format!("Keys for origin '{}' already exist in {}", origin, keys.dir().display()),
            Some("Use --force to overwrite them".to_string()),
        ));
    }

    let password = if no_password {
        None
    } else {
        session.prompt_password(
            "Enter password to protect the signing key (leave empty for no password): ",
            true,
        )?
    };

    ui::status(Status::Generating, format!("origin keys for {}", origin));
    let signing = SigningKeyPair::generate(origin, password)?;
    let (signing_secret, signing_public) = keys.write_signing_pair(&signing)?;
    let encryption = EncryptionKeyPair::generate(origin)?;
    let (box_secret, box_public) = keys.write_encryption_pair(&encryption)?;

    ui::status(Status::Generated, format!("signing key {}", signing_public.display()));
    ui::status(Status::Generated, format!("signing key {}", signing_secret.display()));
    ui::status(Status::Generated, format!("encryption key {}", box_public.display()));
    ui::status(Status::Generated, format!("encryption key {}", box_secret.display()));
    println!();

    if signing.password_protected {
        println!("{}", style("Signing key is password-protected.").dim());
    } else {
        ui::warn("Signing key is NOT password-protected.");
    }
    Ok(())
}

//! Build command - run a plan into a signed artifact

use homestead_build::BuildJob;
use homestead_core::{ChannelIdent, CoreError, PackageTarget, Plan};
use homestead_vault::{BuildSecrets, FileSecretBackend, SecretBackend, Vault};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::session::{Session, StoreAuthorizer, require_token};
use crate::ui::{self, Status};

pub async fn run(
    session: &Session,
    plan_dir: &Path,
    token: Option<String>,
    channel: Option<ChannelIdent>,
    output: Option<PathBuf>,
    target: PackageTarget,
) -> Result<()> {
    let plan = Plan::load(plan_dir)?.plan;
    let store = session.open_store()?;
    let keys = session.keys();

    ui::begin(format!("Building {}/{} {}", plan.origin, plan.name, plan.version));
    ui::status(Status::Building, format!("{} for {}", plan.name, target));

    let token = if plan.secrets.is_empty() {
        token.filter(|t| !t.is_empty())
    } else {
        Some(require_token(token)?)
    };
    let secrets = match token {
        Some(token) => {
            store.authorize(&plan.origin, &token)?;
            let backend = FileSecretBackend::new(store.root())?;
            if backend.list(&plan.origin).await?.is_empty() {
                BuildSecrets::new()
            } else {
                let pair = keys.encryption_pair(&plan.origin)?;
                Vault::new(backend, StoreAuthorizer(&store))
                    .decrypt_for_build(&plan.origin, &pair)
                    .await?
            }
        }
        None => BuildSecrets::new(),
    };
    for name in secrets.names() {
        tracing::debug!(secret = name, "injecting secret");
    }

    let password = match keys.secret_signing_key(&plan.origin, None) {
        Err(CoreError::KeyLocked { .. }) if session.interactive() => session.prompt_password(
            &format!("Password for origin '{}' signing key: ", plan.origin),
            false,
        )?,
        _ => None,
    };

    let mut job = BuildJob::new(plan_dir, &store, keys)
        .channel(channel)
        .secrets(secrets)
        .target(target)
        .password(password);
    if let Some(output) = output {
        job = job.output(output);
    }

    let outcome = job.run().await?;
    for dep in outcome.deps.iter().chain(&outcome.build_deps) {
        ui::status(Status::Resolved, dep);
    }
    ui::status(Status::Built, &outcome.ident);
    ui::info(format!("  {}", outcome.artifact.display()));
    ui::end(format!("Build of {} complete.", outcome.ident));
    Ok(())
}

//! Channel commands - list, promote and demote

use homestead_core::{ChannelIdent, PackageIdent, PackageTarget};

use crate::error::Result;
use crate::session::{Session, require_token};
use crate::ui::{self, Status};

pub fn list(session: &Session, ident: &PackageIdent, target: PackageTarget) -> Result<()> {
    let store = session.open_store()?;
    for channel in store.channels_for(ident, target)? {
        println!("{}", channel);
    }
    Ok(())
}

pub fn promote(
    session: &Session,
    ident: &PackageIdent,
    channel: &ChannelIdent,
    token: Option<String>,
    target: PackageTarget,
) -> Result<()> {
    let token = require_token(token)?;
    let store = session.open_store()?;
    store.authorize(&ident.origin, &token)?;

    ui::status(Status::Promoting, format!("{} to channel '{}'", ident, channel));
    if store.promote(ident, channel, target)? {
        ui::status(Status::Promoted, ident);
    } else {
        ui::status(
            Status::Skipping,
            format!("{} is already in channel '{}'", ident, channel),
        );
    }
    Ok(())
}

pub fn demote(
    session: &Session,
    ident: &PackageIdent,
    channel: &ChannelIdent,
    token: Option<String>,
    target: PackageTarget,
) -> Result<()> {
    let token = require_token(token)?;
    let store = session.open_store()?;
    store.authorize(&ident.origin, &token)?;

    ui::status(Status::Demoting, format!("{} from channel '{}'", ident, channel));
    if store.demote(ident, channel, target)? {
        ui::status(Status::Demoted, ident);
    } else {
        ui::status(
            Status::Skipping,
            format!("{} is not in channel '{}'", ident, channel),
        );
    }
    Ok(())
}

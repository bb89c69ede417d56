//! Resolve command - print the latest identifier matching a partial one

use homestead_core::{ChannelIdent, PackageIdent, PackageTarget};

use crate::error::Result;
use crate::session::Session;

pub fn run(
    session: &Session,
    ident: &PackageIdent,
    channel: Option<&ChannelIdent>,
    target: PackageTarget,
) -> Result<()> {
    let store = session.open_store()?;
    let resolved = store.resolve(ident, channel, target)?;
    println!("{}", resolved);
    Ok(())
}

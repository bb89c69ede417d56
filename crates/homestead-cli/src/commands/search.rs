//! Search command - find packages by origin or name

use console::style;

use crate::error::Result;
use crate::session::Session;

pub fn run(session: &Session, query: &str) -> Result<()> {
    let store = session.open_store()?;
    let records = store.search(query)?;

    if records.is_empty() {
        println!("No packages found matching '{}'", query);
        return Ok(());
    }

    for record in &records {
        println!("{:<60} {}", record.ident, style(record.target).dim());
    }
    println!();
    println!("{} package(s) found", records.len());
    Ok(())
}

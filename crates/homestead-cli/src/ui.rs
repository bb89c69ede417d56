//! Status line output
//!
//! ```text
//! » Uploading core/redis
//! ↑ Uploading results/core-redis-7.2.4-20240101120000-x86_64-linux.hpkg
//! √ Uploaded core/redis/7.2.4/20240101120000
//! ★ Upload of core/redis/7.2.4/20240101120000 complete.
//! ```

use console::{Style, style};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Creating,
    Created,
    Generating,
    Generated,
    Uploading,
    Uploaded,
    Deleting,
    Deleted,
    Promoting,
    Promoted,
    Demoting,
    Demoted,
    Encrypting,
    Building,
    Built,
    Verifying,
    Verified,
    Exporting,
    Exported,
    Resolved,
    Skipping,
}

impl Status {
    fn parts(self) -> (&'static str, &'static str, Style) {
        let info = Style::new().cyan().bold();
        let done = Style::new().green().bold();
        let important = Style::new().magenta().bold();
        match self {
            Status::Creating => ("Ω", "Creating", info),
            Status::Created => ("√", "Created", done),
            Status::Generating => ("☛", "Generating", info),
            Status::Generated => ("→", "Generated", important),
            Status::Uploading => ("↑", "Uploading", info),
            Status::Uploaded => ("√", "Uploaded", done),
            Status::Deleting => ("☒", "Deleting", info),
            Status::Deleted => ("√", "Deleted", done),
            Status::Promoting => ("→", "Promoting", info),
            Status::Promoted => ("√", "Promoted", done),
            Status::Demoting => ("→", "Demoting", info),
            Status::Demoted => ("√", "Demoted", done),
            Status::Encrypting => ("☛", "Encrypting", info),
            Status::Building => ("☛", "Building", info),
            Status::Built => ("√", "Built", done),
            Status::Verifying => ("☛", "Verifying", info),
            Status::Verified => ("√", "Verified", done),
            Status::Exporting => ("☛", "Exporting", info),
            Status::Exported => ("√", "Exported", done),
            Status::Resolved => ("→", "Resolved", important),
            Status::Skipping => ("…", "Skipping", Style::new().yellow().bold()),
        }
    }
}

/// `» message`
pub fn begin(message: impl Display) {
    println!("{}", style(format!("» {}", message)).yellow().bold());
}

/// `★ message`
pub fn end(message: impl Display) {
    println!("{}", style(format!("★ {}", message)).magenta().bold());
}

/// `<symbol> <Status> message`
pub fn status(status: Status, message: impl Display) {
    let (symbol, label, style) = status.parts();
    println!("{} {}", style.apply_to(format!("{} {}", symbol, label)), message);
}

pub fn info(message: impl Display) {
    println!("{}", message);
}

/// Warning on stderr
pub fn warn(message: impl Display) {
    eprintln!("{}", style(format!("∅ {}", message)).yellow().bold());
}

/// Section heading followed by `:`
pub fn heading(title: &str) {
    println!("{}:", style(title).bold());
}

/// Indented `key: value` line under a heading
pub fn field(key: &str, value: impl Display) {
    println!("  {:<12} {}", style(key).dim(), value);
}

pub fn ok(message: impl Display) {
    println!("  {} {}", style("[OK]").green().bold(), message);
}

pub fn fail(message: impl Display) {
    println!("  {} {}", style("[FAIL]").red().bold(), message);
}

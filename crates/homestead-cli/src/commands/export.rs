//! Export command - render a package and its closure into deployable formats

use homestead_core::{ChannelIdent, PackageIdent, PackageTarget};
use homestead_export::{ExportContext, ExportError, ExportFormat, ExportPipeline};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::error::{CliError, Result};
use crate::session::Session;
use crate::ui::{self, Status};
use crate::util::join_or_dash;

pub fn run(
    session: &Session,
    ident: &PackageIdent,
    formats: &[ExportFormat],
    output: &Path,
    channel: Option<&ChannelIdent>,
    target: PackageTarget,
) -> Result<()> {
    let pipeline = ExportPipeline::default();
    let registered = pipeline.formats();
    if let Some(format) = formats.iter().find(|f| !registered.contains(f)) {
        return Err(ExportError::UnsupportedFormat { format: *format }.into());
    }

    let store = session.open_store()?;
    let resolved = store.resolve(ident, channel, target)?;
    if &resolved != ident {
        ui::status(Status::Resolved, format!("{} to {}", ident, resolved));
    }

    let artifact = store.open_artifact(&resolved, target)?;
    let closure = store
        .runtime_closure(&resolved, target)?
        .iter()
        .map(|dep| store.open_artifact(dep, target))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let ctx = ExportContext::new(artifact, closure, output);

    ui::begin(format!("Exporting {}", resolved));
    ui::status(Status::Exporting, join_or_dash(formats));
    let bar = ProgressBar::new(formats.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.dim} [{bar:20.cyan/dim}] {pos}/{len} {msg}")
            .map_err(|e| CliError::internal(e.to_string()))?
            .progress_chars("━░"),
    );

    let mut outputs = Vec::with_capacity(formats.len());
    for format in formats {
        bar.set_message(format.to_string());
        let result = pipeline.export(&ctx, *format);
        bar.inc(1);
        match result {
            Ok(out) => outputs.push(out),
            Err(e) => {
                bar.abandon();
                return Err(e.into());
            }
        }
    }
    bar.finish_and_clear();

    for out in &outputs {
        ui::status(Status::Exported, format!("{} {}", out.format, out.path.display()));
    }
    ui::end(format!("Export of {} complete.", resolved));
    Ok(())
}

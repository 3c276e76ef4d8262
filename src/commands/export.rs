use anyhow::{Context as AnyhowContext, Result};
use std::fs;

use crate::Context;
use crate::cli::ExportArgs;
use crate::progress;
use crate::ui;

use super::{connect, remote_error};

/// Write the remote VM depot to a JSON file
pub fn run(ctx: &Context, args: ExportArgs) -> Result<()> {
    let (settings, client) = connect(&args.connection)?;

    let objects = progress::with_spinner("Fetching VM depot...", ctx.quiet, || {
        client.fetch_objects()
    })
    .map_err(remote_error)?;

    let content = serde_json::to_string_pretty(&objects)?;
    fs::write(&args.output, content)
        .with_context(|| format!("Could not write {}", args.output.display()))?;

    ui::success(&format!(
        "Exported {} objects from {} to {}",
        objects.len(),
        settings.display_host(),
        args.output.display()
    ));
    Ok(())
}

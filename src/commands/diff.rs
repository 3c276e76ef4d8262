use anyhow::Result;
use reconcile::Snapshot;

use crate::Context;
use crate::cli::DiffArgs;
use crate::engine::differ::{display_plans, display_reconciliation};
use crate::progress;
use crate::ui;

use super::{connect, load_inventory, planner, remote_context};

/// Show what `sync` would do. Nothing is written.
pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let inventory = load_inventory(&args.input)?;
    let (settings, client) = connect(&args.connection)?;
    let planner = planner(&settings, &args.input);

    ui::header(&format!("Diff against {}", settings.display_host()));

    let snapshot = progress::with_spinner("Fetching RackTables state...", ctx.quiet, || {
        Snapshot::fetch(&client, &inventory)
    })
    .map_err(remote_context)?;

    display_reconciliation(&snapshot.reconciliation, ctx.quiet);

    // New objects have no remote state yet; their lookups are checked here so
    // `sync` would not stop halfway.
    snapshot.preflight(&planner, &inventory).map_err(remote_context)?;
    let plans = snapshot.plan(&planner, &inventory).map_err(remote_context)?;

    display_plans(snapshot.reconciliation.to_create.len(), &plans);
    Ok(())
}

use anyhow::{Result, bail};
use reconcile::{ApplyOptions, SyncOptions};

use crate::Context;
use crate::cli::SyncArgs;
use crate::engine::{self, TerminalObserver};
use crate::ui;

use super::{connect, load_inventory, planner, remote_context};

pub fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let inventory = load_inventory(&args.input)?;
    let (settings, client) = connect(&args.connection)?;

    ui::header(&format!("Syncing {}", settings.display_host()));
    ui::kv("Export", &args.input.jsonfile.display().to_string());
    ui::kv("VMs", &inventory.len().to_string());
    if ctx.verbose > 0 {
        ui::kv("API", &settings.api_url);
        ui::kv("User", &settings.user);
    }
    if args.dry_run {
        ui::info("Dry run: nothing will be written");
    }

    let opts = SyncOptions {
        apply: ApplyOptions {
            dry_run: args.dry_run,
        },
        planner: planner(&settings, &args.input),
    };

    let mut observer = TerminalObserver::new(ctx.quiet).with_fetch_spinner();
    let outcome =
        reconcile::sync::run(&client, &inventory, &opts, &mut observer).map_err(remote_context)?;
    drop(observer);

    engine::print_summary(&outcome, args.dry_run);

    if !outcome.is_success() {
        let failed = outcome.creations.failed() + outcome.updates.failed();
        bail!("{failed} RackTables changes failed");
    }
    Ok(())
}

//! Terminal reporting for a reconciliation run

use colored::Colorize;
use indicatif::ProgressBar;
use reconcile::{
    ApplyObserver, ApplyReport, MutationOutcome, MutationStatus, Reconciliation, SyncObserver,
    SyncOutcome, VmPlan,
};

use super::differ::{display_plans, display_reconciliation, mutation_symbol};
use crate::progress;

/// Prints one line per mutation as the run progresses
pub struct TerminalObserver {
    quiet: bool,
    /// Spinner shown while the initial fetch runs
    fetching: Option<ProgressBar>,
    to_create: usize,
    current_vm: Option<String>,
}

impl TerminalObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            fetching: None,
            to_create: 0,
            current_vm: None,
        }
    }

    /// Show a spinner until the remote state has been fetched
    pub fn with_fetch_spinner(mut self) -> Self {
        self.fetching = Some(progress::spinner("Fetching RackTables state...", self.quiet));
        self
    }
}

impl ApplyObserver for TerminalObserver {
    fn on_mutation_start(&mut self, vm: &str, _mutation: &reconcile::Mutation) {
        if self.current_vm.as_deref() != Some(vm) {
            println!("  {}", vm.bold());
            self.current_vm = Some(vm.to_string());
        }
    }

    fn on_mutation_complete(&mut self, outcome: &MutationOutcome) {
        let status = match &outcome.status {
            MutationStatus::Applied => "ok".green(),
            MutationStatus::AlreadyPresent => "already present".dimmed(),
            MutationStatus::Skipped => "skipped".yellow(),
            MutationStatus::Failed { error } => format!("failed: {error}").red(),
        };
        println!(
            "    {} {:<40} {}",
            mutation_symbol(&outcome.mutation),
            outcome.mutation.to_string(),
            status
        );
    }
}

impl SyncObserver for TerminalObserver {
    fn on_reconciled(&mut self, reconciliation: &Reconciliation) {
        if let Some(pb) = self.fetching.take() {
            progress::finish_success(&pb, "Fetched RackTables state");
        }
        self.to_create = reconciliation.to_create.len();
        display_reconciliation(reconciliation, self.quiet);
        if self.to_create > 0 {
            println!();
            println!("  {} Creating {} objects", "→".cyan(), self.to_create);
        }
    }

    fn on_planned(&mut self, plans: &[VmPlan]) {
        if !self.quiet {
            display_plans(0, plans);
        }
        let pending = plans.iter().filter(|p| !p.is_empty()).count();
        if pending > 0 {
            println!();
            println!("  {} Updating {} objects", "→".cyan(), pending);
        }
        self.current_vm = None;
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        if let Some(pb) = self.fetching.take() {
            progress::finish_clear(&pb);
        }
    }
}

/// Counts over every mutation of a run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub already_present: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcome(outcome: &SyncOutcome) -> Self {
        let count = |report: &ApplyReport, pred: fn(&MutationStatus) -> bool| {
            report.outcomes.iter().filter(|o| pred(&o.status)).count()
        };
        Self {
            created: count(&outcome.creations, |s: &MutationStatus| {
                matches!(s, MutationStatus::Applied)
            }),
            already_present: count(&outcome.creations, |s: &MutationStatus| {
                matches!(s, MutationStatus::AlreadyPresent)
            }),
            updated: outcome.updates.applied(),
            skipped: outcome.creations.skipped() + outcome.updates.skipped(),
            failed: outcome.creations.failed() + outcome.updates.failed(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Print final summary, listing failures last
pub fn print_summary(outcome: &SyncOutcome, dry_run: bool) {
    let summary = RunSummary::from_outcome(outcome);

    println!();
    if dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.is_success() {
        println!("  {} RackTables is in sync", "✓".green().bold());
    } else {
        println!("  {} Sync finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} objects created", summary.created);
    }
    if summary.already_present > 0 {
        println!("    • {} objects already present", summary.already_present);
    }
    if summary.updated > 0 {
        println!("    • {} changes applied", summary.updated);
    }
    if summary.skipped > 0 {
        println!("    • {} changes skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "changes".red());
        for failure in outcome.creations.failures().chain(outcome.updates.failures()) {
            println!(
                "      {} {}: {} ({})",
                "✗".red(),
                failure.vm,
                failure.mutation,
                failure.status
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::Mutation;

    fn outcome(vm: &str, mutation: Mutation, status: MutationStatus) -> MutationOutcome {
        MutationOutcome {
            vm: vm.to_string(),
            mutation,
            status,
        }
    }

    fn create(name: &str) -> Mutation {
        Mutation::Create {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_run_summary_counts() {
        let creations = ApplyReport {
            outcomes: vec![
                outcome("vm1", create("vm1"), MutationStatus::Applied),
                outcome("vm2", create("vm2"), MutationStatus::AlreadyPresent),
                outcome(
                    "vm3",
                    create("vm3"),
                    MutationStatus::Failed {
                        error: "boom".to_string(),
                    },
                ),
            ],
        };
        let updates = ApplyReport {
            outcomes: vec![outcome(
                "vm1",
                Mutation::Link {
                    object_id: racktables::ObjectId(9),
                    container: racktables::ObjectId(100),
                },
                MutationStatus::Applied,
            )],
        };
        let run = SyncOutcome {
            plans: vec![],
            creations,
            updates,
        };

        let summary = RunSummary::from_outcome(&run);
        assert_eq!(
            summary,
            RunSummary {
                created: 1,
                already_present: 1,
                updated: 1,
                skipped: 0,
                failed: 1,
            }
        );
        assert!(!summary.is_success());
    }
}

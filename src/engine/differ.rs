//! Reconciliation and plan display

use colored::{ColoredString, Colorize};
use reconcile::{Mutation, Reconciliation, VmPlan};

use crate::ui;

/// Glyph for a mutation kind
pub fn mutation_symbol(mutation: &Mutation) -> ColoredString {
    match mutation {
        Mutation::Create { .. } | Mutation::Link { .. } | Mutation::AddIp { .. } => "+".green(),
        Mutation::Unlink { .. } | Mutation::RemoveIp { .. } => "-".red(),
        Mutation::SetTags { .. } => "~".yellow(),
    }
}

/// Print to-create and matched counts, and the names unless quiet
pub fn display_reconciliation(reconciliation: &Reconciliation, quiet: bool) {
    ui::section("Reconciliation");
    ui::count("to create", reconciliation.to_create.len());
    if !quiet && !reconciliation.to_create.is_empty() {
        ui::names(&reconciliation.to_create);
    }
    ui::count("matched", reconciliation.matched.len());
    if !quiet && !reconciliation.matched.is_empty() {
        ui::names(&reconciliation.matched);
    }
}

/// Print the changes planned for matched VMs
pub fn display_plans(to_create: usize, plans: &[VmPlan]) {
    let pending: Vec<&VmPlan> = plans.iter().filter(|p| !p.is_empty()).collect();

    if pending.is_empty() && to_create == 0 {
        println!();
        println!("  {} RackTables already matches the export", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "RackTables Diff".bold()
    );
    println!("│");

    for plan in &pending {
        println!("│ {} {}", plan.name.bold(), format!("#{}", plan.object_id).dimmed());
        for mutation in plan.mutations() {
            let note = match (&mutation, &plan.tag) {
                (Mutation::SetTags { .. }, Some(tag)) => format!(" ({})", tag.project),
                _ => String::new(),
            };
            println!(
                "│   {} {}{}",
                mutation_symbol(&mutation),
                mutation,
                note.dimmed()
            );
        }
        println!("│");
    }

    let mutations: usize = pending.iter().map(|p| p.mutations().len()).sum();
    let unchanged = plans.len() - pending.len();

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update ({} changes), {} unchanged",
        to_create.to_string().green(),
        pending.len().to_string().yellow(),
        mutations.to_string().bold(),
        unchanged.to_string().dimmed()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

//! Apply step - turns plans into RackTables calls
//!
//! Mutations run one at a time. A failed mutation is recorded and the run
//! moves on; nothing is retried.

use crate::delta::{Mutation, VmPlan};
use racktables::{Client, CreateOutcome};
use std::fmt;

/// What happened to one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    /// The server accepted the write
    Applied,
    /// Creation was rejected because the object exists (accepted by policy)
    AlreadyPresent,
    /// Dry run, nothing sent
    Skipped,
    /// The write failed
    Failed { error: String },
}

impl MutationStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "ok"),
            Self::AlreadyPresent => write!(f, "already present"),
            Self::Skipped => write!(f, "skipped (dry run)"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Outcome of one mutation for one VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub vm: String,
    pub mutation: Mutation,
    pub status: MutationStatus,
}

/// Receives apply progress
pub trait ApplyObserver {
    /// Called before a mutation is sent
    fn on_mutation_start(&mut self, _vm: &str, _mutation: &Mutation) {}

    /// Called after a mutation finished (or was skipped)
    fn on_mutation_complete(&mut self, outcome: &MutationOutcome);
}

/// Observer that ignores everything
pub struct NoObserver;

impl ApplyObserver for NoObserver {
    fn on_mutation_complete(&mut self, _outcome: &MutationOutcome) {}
}

/// Options for the apply step
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would be sent without sending it
    pub dry_run: bool,
}

/// Collected outcomes of an apply run
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<MutationOutcome>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, MutationStatus::Applied | MutationStatus::AlreadyPresent))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, MutationStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(MutationStatus::is_failure)
    }

    /// No mutation failed
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed outcomes in the order they happened
    pub fn failures(&self) -> impl Iterator<Item = &MutationOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    /// Append another report
    pub fn merge(&mut self, other: ApplyReport) {
        self.outcomes.extend(other.outcomes);
    }

    fn count(&self, pred: impl Fn(&MutationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Create one object per name.
///
/// The caller must refetch objects afterwards; new ids are not tracked here.
pub fn create_missing<'a, O: ApplyObserver>(
    client: &Client,
    names: impl IntoIterator<Item = &'a String>,
    opts: ApplyOptions,
    observer: &mut O,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for name in names {
        let mutation = Mutation::Create { name: name.clone() };
        let outcome = run(client, name, mutation, opts, observer);
        report.outcomes.push(outcome);
    }
    report
}

/// Apply plans VM by VM: tag, then container, then addresses.
pub fn apply_plans<O: ApplyObserver>(
    client: &Client,
    plans: &[VmPlan],
    opts: ApplyOptions,
    observer: &mut O,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for plan in plans {
        for mutation in plan.mutations() {
            let outcome = run(client, &plan.name, mutation, opts, observer);
            report.outcomes.push(outcome);
        }
    }
    report
}

fn run<O: ApplyObserver>(
    client: &Client,
    vm: &str,
    mutation: Mutation,
    opts: ApplyOptions,
    observer: &mut O,
) -> MutationOutcome {
    observer.on_mutation_start(vm, &mutation);

    let status = if opts.dry_run {
        MutationStatus::Skipped
    } else {
        match send(client, &mutation) {
            Ok(status) => status,
            Err(err) => {
                log::warn!("{vm}: {mutation} failed: {err}");
                MutationStatus::Failed {
                    error: err.to_string(),
                }
            }
        }
    };

    let outcome = MutationOutcome {
        vm: vm.to_string(),
        mutation,
        status,
    };
    observer.on_mutation_complete(&outcome);
    outcome
}

fn send(client: &Client, mutation: &Mutation) -> racktables::Result<MutationStatus> {
    match mutation {
        Mutation::Create { name } => match client.create_object(name)? {
            CreateOutcome::Created { .. } => Ok(MutationStatus::Applied),
            CreateOutcome::AlreadyExists => Ok(MutationStatus::AlreadyPresent),
        },
        Mutation::SetTags { object_id, tags } => {
            client.set_tags(*object_id, tags)?;
            Ok(MutationStatus::Applied)
        }
        Mutation::Unlink {
            object_id,
            container,
        } => {
            client.unlink_container(*object_id, *container)?;
            Ok(MutationStatus::Applied)
        }
        Mutation::Link {
            object_id,
            container,
        } => {
            client.link_container(*object_id, *container)?;
            Ok(MutationStatus::Applied)
        }
        Mutation::RemoveIp { object_id, ip } => {
            client.remove_ip(*object_id, *ip)?;
            Ok(MutationStatus::Applied)
        }
        Mutation::AddIp {
            object_id,
            ip,
            interface,
        } => {
            client.add_ip(*object_id, *ip, interface)?;
            Ok(MutationStatus::Applied)
        }
    }
}

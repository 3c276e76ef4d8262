//! A full reconciliation run
//!
//! 1. Fetch objects, project tags and containers
//! 2. Diff against the local inventory
//! 3. Check every lookup the run will need, before any write
//! 4. Create missing objects
//! 5. Refetch objects so new ones have ids, and diff again
//! 6. Plan and apply tag, container and address changes

use crate::apply::{self, ApplyObserver, ApplyOptions, ApplyReport, NoObserver};
use crate::delta::{Planner, VmPlan};
use crate::diff::Reconciliation;
use crate::error::{Error, LookupKind, Result};
use crate::inventory::Inventory;
use racktables::{Client, ClusterIndex, ProjectTagIndex};
use std::collections::BTreeSet;

/// Remote state captured at the start of a run
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub reconciliation: Reconciliation,
    pub projects: ProjectTagIndex,
    pub clusters: ClusterIndex,
}

impl Snapshot {
    /// Fetch everything the reconciler reads
    pub fn fetch(client: &Client, inventory: &Inventory) -> Result<Self> {
        let objects = client.fetch_objects()?;
        let projects = client.fetch_project_tags()?;
        let clusters = client.fetch_clusters()?;
        log::info!(
            "fetched {} objects, {} project tags, {} containers",
            objects.len(),
            projects.len(),
            clusters.len()
        );
        if clusters.is_empty() {
            log::warn!("no cluster or project containers found");
        }

        Ok(Self {
            reconciliation: Reconciliation::compute(inventory, &objects),
            projects,
            clusters,
        })
    }

    /// Refetch objects and recompute the diff; the indexes are kept.
    ///
    /// A filtered depot does not list untagged objects, so `created` names
    /// missing from it are looked up in the unfiltered depot.
    pub fn refresh(
        &mut self,
        client: &Client,
        inventory: &Inventory,
        created: &BTreeSet<String>,
    ) -> Result<()> {
        let mut objects = client.fetch_objects()?;

        if !client.config().depot_filter_tags.is_empty() && !created.is_empty() {
            let listed: BTreeSet<String> = objects.values().map(|o| o.name.clone()).collect();
            let untagged: Vec<_> = client
                .fetch_all_objects()?
                .into_values()
                .filter(|o| created.contains(&o.name) && !listed.contains(&o.name))
                .collect();
            log::debug!("{} new objects outside the depot filter", untagged.len());
            objects.extend(untagged.into_iter().map(|o| (o.id, o)));
        }

        self.reconciliation = Reconciliation::compute(inventory, &objects);
        Ok(())
    }

    /// Plan every matched VM
    pub fn plan(&self, planner: &Planner, inventory: &Inventory) -> Result<Vec<VmPlan>> {
        planner.plan(&self.reconciliation, inventory, &self.projects, &self.clusters)
    }

    /// Fail now on lookups that would otherwise fail after objects were created.
    ///
    /// VMs about to be created will start with no tag and no container, so
    /// both their project and their cluster must resolve.
    pub fn preflight(&self, planner: &Planner, inventory: &Inventory) -> Result<()> {
        for vm in self
            .reconciliation
            .to_create
            .iter()
            .filter_map(|name| inventory.get(name))
        {
            if self.projects.get(&vm.project).is_none() {
                return Err(Error::Lookup {
                    kind: LookupKind::ProjectTag,
                    name: vm.project.clone(),
                    vm: vm.name.clone(),
                });
            }
            if self.clusters.get(&vm.cluster).is_none() {
                return Err(Error::Lookup {
                    kind: LookupKind::Container,
                    name: vm.cluster.clone(),
                    vm: vm.name.clone(),
                });
            }
        }

        self.plan(planner, inventory).map(drop)
    }
}

/// Options for a run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub apply: ApplyOptions,
    pub planner: Planner,
}

/// Everything a run did
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Plans applied after creation
    pub plans: Vec<VmPlan>,
    pub creations: ApplyReport,
    pub updates: ApplyReport,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.creations.is_success() && self.updates.is_success()
    }
}

/// Hooks for the phases of a run
pub trait SyncObserver: ApplyObserver {
    /// The initial diff is known
    fn on_reconciled(&mut self, _reconciliation: &Reconciliation) {}

    /// Plans for matched VMs are known
    fn on_planned(&mut self, _plans: &[VmPlan]) {}
}

impl SyncObserver for NoObserver {}

/// Run a full reconciliation.
///
/// Read and lookup failures abort the run; mutation failures are collected.
pub fn run<O: SyncObserver>(
    client: &Client,
    inventory: &Inventory,
    opts: &SyncOptions,
    observer: &mut O,
) -> Result<SyncOutcome> {
    let mut snapshot = Snapshot::fetch(client, inventory)?;
    observer.on_reconciled(&snapshot.reconciliation);
    snapshot.preflight(&opts.planner, inventory)?;

    let to_create = snapshot.reconciliation.to_create.clone();
    let creations = apply::create_missing(client, &to_create, opts.apply, observer);

    if !opts.apply.dry_run && !to_create.is_empty() {
        snapshot.refresh(client, inventory, &to_create)?;
        if !snapshot.reconciliation.to_create.is_empty() {
            log::warn!(
                "{} VMs still missing after creation",
                snapshot.reconciliation.to_create.len()
            );
        }
    }

    let plans = snapshot.plan(&opts.planner, inventory)?;
    observer.on_planned(&plans);
    let updates = apply::apply_plans(client, &plans, opts.apply, observer);

    Ok(SyncOutcome {
        plans,
        creations,
        updates,
    })
}

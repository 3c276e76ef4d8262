//! # Reconcile
//!
//! Converge RackTables VM objects toward a local vSphere export.
//!
//! ## Core Concepts
//!
//! - **Inventory**: the local export, keyed by VM name
//! - **Reconciliation**: powered-on VMs split into "to create" and "matched"
//! - **VmPlan**: tag, container and address mutations for one matched VM
//! - **ApplyReport**: what happened to each mutation
//!
//! ## Example
//!
//! ```no_run
//! use racktables::{Client, ClientConfig, Credentials};
//! use reconcile::{Inventory, Layout, NoObserver, SyncOptions};
//! use std::path::Path;
//!
//! let inventory = Inventory::load(Path::new("getVMsWithPlacement.json"), Layout::Flat)?;
//! let client = Client::new(
//!     "http://rt.example.com/racktables/api.php",
//!     &Credentials::new("admin", "secret"),
//!     ClientConfig::default(),
//! );
//!
//! let outcome = reconcile::sync::run(&client, &inventory, &SyncOptions::default(), &mut NoObserver)?;
//! println!("{} mutations failed", outcome.updates.failed());
//! # Ok::<(), reconcile::Error>(())
//! ```

#![warn(clippy::all)]

pub mod apply;
pub mod delta;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod sync;

pub use apply::{
    ApplyObserver, ApplyOptions, ApplyReport, MutationOutcome, MutationStatus, NoObserver,
    apply_plans, create_missing,
};
pub use delta::{
    ContainerChange, ContainerDelta, DEFAULT_INTERFACE_PREFIX, IpAssignment, IpPolicy, Mutation,
    Planner, TagAssignment, VmPlan,
};
pub use diff::{Reconciliation, RemoteSummary};
pub use error::{Error, LookupKind, Result};
pub use inventory::{Interface, Inventory, Layout, LocalVm, PowerState};
pub use sync::{Snapshot, SyncObserver, SyncOptions, SyncOutcome};

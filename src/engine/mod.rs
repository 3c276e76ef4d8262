//! Terminal side of a reconciliation run
//!
//! 1. Differ - show the reconciliation and per-VM plans
//! 2. Executor - report each mutation and summarize the run

pub mod differ;
pub mod executor;

pub use executor::{TerminalObserver, print_summary};

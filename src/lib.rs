// ABOUTME: Library root for acr-sweep - exposes the reconciliation engine and its plumbing.
// ABOUTME: The main binary is in main.rs.

pub mod audit;
pub mod az;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod prompt;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod types;
pub mod workload;

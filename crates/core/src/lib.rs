//! iconsync core library.
//!
//! This crate keeps small UI icons consistent between a design repository and
//! a development repository: icon filtering, snapshot building from git
//! indexes, history-based reconciliation, sync into the design repository,
//! and reporting.

pub mod checker;
pub mod config;
pub mod errors;
pub mod filter;
pub mod git;
pub mod image;
pub mod models;
pub mod project_model;
pub mod reconcile;
pub mod report;
pub mod snapshot;
pub mod sync;
mod xml;

// Re-exports for convenience.
pub use checker::{CheckOptions, IconChecker};
pub use config::IconSyncConfig;
pub use errors::CoreError;
pub use models::{Category, ClassificationResult, ContentObject, Snapshot};
pub use reconcile::ReconciliationEngine;
pub use report::{ErrorHandler, FailOnDivergence, LogDivergence, Report};

//! Error types for the iconsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Divergence remained after a read-only run and the error handler
    /// rejected it.
    #[error("icons are not in sync:\n{0}")]
    Divergence(String),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path does not exist or is not inside a git work tree.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// The repository has no work tree (bare repository).
    #[error("git repository at '{0}' has no work tree")]
    BareRepository(String),

    /// A path that was expected inside a repository lies outside it.
    #[error("path '{path}' is outside repository '{repo}'")]
    PathOutsideRepository { path: String, repo: String },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Image errors
// ---------------------------------------------------------------------------

/// Errors from reading image headers.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The header could not be decoded.
    #[error("cannot decode image '{path}': {detail}")]
    Undecodable { path: String, detail: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Reconciliation errors
// ---------------------------------------------------------------------------

/// Errors that abort classification.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A snapshot object has no positive history in its own repository.
    #[error("no positive change time ({time}) for {object}")]
    NonPositiveChangeTime { object: String, time: i64 },

    /// A history lookup failed.
    #[error("history lookup failed: {0}")]
    Git(#[from] GitError),

    /// A lookup task panicked or was cancelled.
    #[error("lookup task failed: {0}")]
    TaskFailed(String),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Failure of a single sync action. Collected, never propagated.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to delete '{path}': {source}")]
    Delete {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stage changes: {0}")]
    Stage(#[from] GitError),
}

//! Git operations for iconsync.
//!
//! [`VcsGateway`] is the seam between the reconciliation core and version
//! control; [`GitGateway`] is the git2-backed implementation.

use std::path::{Path, PathBuf};

use crate::errors::GitError;
use crate::models::ContentObject;

pub mod client;

pub use client::{GitClient, GitGateway};

/// Version-control operations consumed by snapshot building, reconciliation
/// and sync.
pub trait VcsGateway: Send + Sync {
    /// Work-tree root of the repository containing `path`.
    fn repo_root(&self, path: &Path) -> Result<PathBuf, GitError>;

    /// `root` itself followed by every nested repository under it, in a
    /// stable order.
    fn sub_roots(&self, root: &Path) -> Result<Vec<PathBuf>, GitError>;

    /// Tracked files of `repo` located under `dir` that satisfy `predicate`.
    ///
    /// Logical paths are relative to `dir`.
    fn list_tracked_objects(
        &self,
        repo: &Path,
        dir: &Path,
        predicate: &mut dyn FnMut(&Path) -> bool,
    ) -> Result<Vec<ContentObject>, GitError>;

    /// Commit time (seconds since epoch) of the newest commit touching
    /// `path` (relative to `repo`), or `0` without history.
    fn latest_change_time(&self, repo: &Path, path: &Path) -> Result<i64, GitError>;

    /// Stage `added` and unstage-and-forget `removed` (both relative to
    /// `repo`).
    fn stage(&self, repo: &Path, added: &[PathBuf], removed: &[PathBuf]) -> Result<(), GitError>;
}

//! Snapshot building for the design and dev sides.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, trace, warn};

use crate::errors::GitError;
use crate::filter::{IconFilter, SkippedDirs, TestRootSet};
use crate::git::VcsGateway;
use crate::models::Snapshot;

/// Builds [`Snapshot`]s of icon files tracked under a directory.
pub struct SnapshotBuilder<'a> {
    vcs: &'a dyn VcsGateway,
    filter: IconFilter<'a>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(vcs: &'a dyn VcsGateway, filter: IconFilter<'a>) -> Self {
        Self { vcs, filter }
    }

    /// Icons tracked by `repo` under `dir`.
    #[instrument(skip(self), fields(repo = %repo.display(), dir = %dir.display()))]
    pub fn design_snapshot(&self, repo: &Path, dir: &Path) -> Result<Snapshot, GitError> {
        let mut predicate = |file: &Path| {
            let decision = self.filter.evaluate(file);
            trace!(file = %file.display(), decision = decision.label(), "design candidate");
            decision.is_icon()
        };
        let snapshot: Snapshot = self
            .vcs
            .list_tracked_objects(repo, dir, &mut predicate)?
            .into_iter()
            .collect();
        info!(count = snapshot.len(), "read design icons");
        Ok(snapshot)
    }

    /// Icons tracked under `dir` by the dev repository `repo` and its nested
    /// `roots`, excluding test roots.
    ///
    /// With several roots, the first root (in the given order) producing a
    /// logical path wins; later duplicates are logged and dropped.
    #[instrument(skip(self, roots, test_roots, skipped), fields(repo = %repo.display(), dir = %dir.display()))]
    pub fn dev_snapshot(
        &self,
        repo: &Path,
        dir: &Path,
        roots: &[PathBuf],
        test_roots: &TestRootSet,
        skipped: &mut SkippedDirs,
    ) -> Result<Snapshot, GitError> {
        let mut predicate = |file: &Path| {
            let decision = self.filter.evaluate_dev(file, test_roots, skipped);
            trace!(file = %file.display(), decision = decision.label(), "dev candidate");
            decision.is_icon()
        };

        let single_root = roots.len() == 1 && roots[0].as_path() == repo;
        let snapshot = if single_root {
            self.vcs
                .list_tracked_objects(repo, dir, &mut predicate)?
                .into_iter()
                .collect()
        } else {
            let mut snapshot = Snapshot::default();
            for root in roots {
                for object in self.vcs.list_tracked_objects(root, dir, &mut predicate)? {
                    let path = object.logical_path.clone();
                    let from = object.repo.clone();
                    if !snapshot.insert_first(object) {
                        warn!(
                            path,
                            root = %from.display(),
                            "icon already provided by an earlier root, ignoring"
                        );
                    }
                }
            }
            snapshot
        };
        info!(count = snapshot.len(), roots = roots.len(), "read dev icons");
        Ok(snapshot)
    }
}

//! Mirroring dev-authored icon changes into the design repository.
//!
//! Only the design repository is ever written. Each action runs on its own:
//! a failed copy or delete is recorded and the remaining actions still run.

use std::path::{Path, PathBuf};

use tracing::{error, info, instrument};

use crate::errors::SyncError;
use crate::git::VcsGateway;
use crate::models::{ClassificationResult, ContentObject, Snapshot};

/// A single filesystem mutation against the design repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy the dev object's file to `destination`.
    Copy {
        source: ContentObject,
        destination: PathBuf,
    },
    /// Delete `path`.
    Delete { path: PathBuf },
}

/// What a sync batch did.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub copied: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<SyncError>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Derive the actions for `added_by_dev`, `modified_by_dev` and
/// `removed_by_dev`, in that order and sorted by path within each group.
pub fn plan(
    result: &ClassificationResult,
    design: &Snapshot,
    dev: &Snapshot,
    design_dir: &Path,
) -> Vec<SyncAction> {
    let mut actions = Vec::new();
    for path in &result.added_by_dev {
        if let Some(source) = dev.get(path) {
            actions.push(SyncAction::Copy {
                source: source.clone(),
                destination: design_dir.join(path),
            });
        }
    }
    for path in &result.modified_by_dev {
        if let (Some(source), Some(target)) = (dev.get(path), design.get(path)) {
            actions.push(SyncAction::Copy {
                source: source.clone(),
                destination: target.file(),
            });
        }
    }
    for path in &result.removed_by_dev {
        if let Some(target) = design.get(path) {
            actions.push(SyncAction::Delete {
                path: target.file(),
            });
        }
    }
    actions
}

/// Applies [`SyncAction`]s and stages the result in the design repository.
pub struct SyncExecutor<'a> {
    vcs: &'a dyn VcsGateway,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(vcs: &'a dyn VcsGateway) -> Self {
        Self { vcs }
    }

    #[instrument(skip(self, actions), fields(actions = actions.len(), repo = %design_repo.display()))]
    pub fn execute(&self, actions: &[SyncAction], design_repo: &Path) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        for action in actions {
            match action {
                SyncAction::Copy {
                    source,
                    destination,
                } => match copy_file(&source.file(), destination) {
                    Ok(()) => outcome.copied.push(destination.clone()),
                    Err(e) => {
                        error!(error = %e, "sync copy failed");
                        outcome.failures.push(e);
                    }
                },
                SyncAction::Delete { path } => match std::fs::remove_file(path) {
                    Ok(()) => outcome.deleted.push(path.clone()),
                    Err(source) => {
                        let e = SyncError::Delete {
                            path: path.display().to_string(),
                            source,
                        };
                        error!(error = %e, "sync delete failed");
                        outcome.failures.push(e);
                    }
                },
            }
        }

        if !outcome.copied.is_empty() || !outcome.deleted.is_empty() {
            let added = relative_to(&outcome.copied, design_repo);
            let removed = relative_to(&outcome.deleted, design_repo);
            if let Err(e) = self.vcs.stage(design_repo, &added, &removed) {
                error!(error = %e, "staging synced icons failed");
                outcome.failures.push(SyncError::Stage(e));
            }
        }

        info!(
            copied = outcome.copied.len(),
            deleted = outcome.deleted.len(),
            failed = outcome.failures.len(),
            "sync finished"
        );
        outcome
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), SyncError> {
    let wrap = |source| SyncError::Copy {
        from: from.display().to_string(),
        to: to.display().to_string(),
        source,
    };
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(wrap)?;
    }
    std::fs::copy(from, to).map_err(wrap)?;
    Ok(())
}

fn relative_to(paths: &[PathBuf], repo: &Path) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|p| p.strip_prefix(repo).ok().map(Path::to_path_buf))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::FakeVcs;

    fn object(repo: &Path, path: &str, hash: &str) -> ContentObject {
        ContentObject {
            logical_path: path.to_string(),
            hash: hash.to_string(),
            repo: repo.to_path_buf(),
            repo_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_plan_orders_copies_before_deletes() {
        let design_dir = Path::new("/design");
        let design: Snapshot = vec![
            object(design_dir, "mod.png", "1"),
            object(design_dir, "gone.png", "2"),
        ]
        .into_iter()
        .collect();
        let dev: Snapshot = vec![
            object(Path::new("/dev"), "mod.png", "9"),
            object(Path::new("/dev"), "new.png", "3"),
        ]
        .into_iter()
        .collect();
        let mut result = ClassificationResult::default();
        result.added_by_dev.insert("new.png".into());
        result.modified_by_dev.insert("mod.png".into());
        result.removed_by_dev.insert("gone.png".into());

        let actions = plan(&result, &design, &dev, design_dir);
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            SyncAction::Copy { destination, .. } if destination == Path::new("/design/new.png")
        ));
        assert!(matches!(
            &actions[1],
            SyncAction::Copy { source, .. } if source.hash == "9"
        ));
        assert_eq!(
            actions[2],
            SyncAction::Delete {
                path: PathBuf::from("/design/gone.png")
            }
        );
    }

    #[test]
    fn test_execute_copies_deletes_and_stages() {
        let dev = tempfile::tempdir().unwrap();
        let design = tempfile::tempdir().unwrap();
        std::fs::write(dev.path().join("new.png"), b"new").unwrap();
        std::fs::write(design.path().join("gone.png"), b"old").unwrap();

        let actions = vec![
            SyncAction::Copy {
                source: object(dev.path(), "new.png", "h"),
                destination: design.path().join("icons/new.png"),
            },
            SyncAction::Delete {
                path: design.path().join("gone.png"),
            },
        ];
        let vcs = FakeVcs::default();
        let outcome = SyncExecutor::new(&vcs).execute(&actions, design.path());

        assert!(outcome.is_success());
        assert_eq!(
            std::fs::read(design.path().join("icons/new.png")).unwrap(),
            b"new"
        );
        assert!(!design.path().join("gone.png").exists());
        let staged = vcs.staged.lock().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].1, vec![PathBuf::from("icons/new.png")]);
        assert_eq!(staged[0].2, vec![PathBuf::from("gone.png")]);
    }

    #[test]
    fn test_failed_action_does_not_stop_batch() {
        let dev = tempfile::tempdir().unwrap();
        let design = tempfile::tempdir().unwrap();
        std::fs::write(dev.path().join("ok.png"), b"ok").unwrap();

        let actions = vec![
            SyncAction::Copy {
                source: object(dev.path(), "missing.png", "h"),
                destination: design.path().join("missing.png"),
            },
            SyncAction::Delete {
                path: design.path().join("never-existed.png"),
            },
            SyncAction::Copy {
                source: object(dev.path(), "ok.png", "h"),
                destination: design.path().join("ok.png"),
            },
        ];
        let vcs = FakeVcs::default();
        let outcome = SyncExecutor::new(&vcs).execute(&actions, design.path());

        assert!(!outcome.is_success());
        assert_eq!(outcome.failures.len(), 2);
        assert!(matches!(outcome.failures[0], SyncError::Copy { .. }));
        assert!(matches!(outcome.failures[1], SyncError::Delete { .. }));
        assert_eq!(outcome.copied, vec![design.path().join("ok.png")]);
    }
}

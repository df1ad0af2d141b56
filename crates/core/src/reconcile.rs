//! Reconciliation of the design and dev snapshots.
//!
//! Every logical path present in either snapshot ends up in exactly one
//! [`Category`](crate::models::Category):
//!
//! 1. Paths in both snapshots with equal hashes are consistent.
//! 2. Paths in both with different hashes go to whichever side changed them
//!    last (dev only when strictly newer).
//! 3. Paths only in the design snapshot were either added by designers or
//!    removed by dev; the latter when dev history of the path (in any dev
//!    root) is strictly newer than the design change.
//! 4. Paths only in the dev snapshot were either added by dev or removed by
//!    designers; the latter when design history of the path is strictly
//!    newer than the dev change.
//!
//! History lookups in 2-4 run concurrently on the blocking pool. A snapshot
//! object without positive history aborts the whole run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::errors::{GitError, ReconcileError};
use crate::git::VcsGateway;
use crate::models::{logical_path_of, ClassificationResult, ContentObject, Snapshot};

/// Default bound on concurrent history lookups.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 16;

/// Where the two sides live, as needed by history lookups.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    /// Work-tree root of the design repository.
    pub design_repo: PathBuf,
    /// Scanned design directory relative to `design_repo` (may be empty).
    pub design_prefix: PathBuf,
    /// Scanned dev directory.
    pub dev_dir: PathBuf,
    /// Dev repository roots, outermost first.
    pub dev_roots: Vec<PathBuf>,
}

impl RepoLayout {
    pub fn new(
        design_repo: &Path,
        design_dir: &Path,
        dev_dir: &Path,
        dev_roots: Vec<PathBuf>,
    ) -> Result<Self, GitError> {
        let design_prefix = design_dir
            .strip_prefix(design_repo)
            .map_err(|_| GitError::PathOutsideRepository {
                path: design_dir.display().to_string(),
                repo: design_repo.display().to_string(),
            })?
            .to_path_buf();
        Ok(Self {
            design_repo: design_repo.to_path_buf(),
            design_prefix,
            dev_dir: dev_dir.to_path_buf(),
            dev_roots,
        })
    }
}

/// Classifies diverging icons, resolving authorship from history.
pub struct ReconciliationEngine {
    vcs: Arc<dyn VcsGateway>,
    max_concurrent: usize,
}

impl ReconciliationEngine {
    pub fn new(vcs: Arc<dyn VcsGateway>, max_concurrent: usize) -> Self {
        Self {
            vcs,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Partition every path of `design` and `dev` into the seven categories.
    #[instrument(skip_all, fields(design = design.len(), dev = dev.len()))]
    pub async fn reconcile(
        &self,
        design: &Snapshot,
        dev: &Snapshot,
        layout: &RepoLayout,
    ) -> Result<ClassificationResult, ReconcileError> {
        let mut result = ClassificationResult::default();
        let mut only_in_design = Vec::new();
        let mut modified = Vec::new();

        for object in design.iter() {
            match dev.get(&object.logical_path) {
                None => only_in_design.push((object.logical_path.clone(), object.clone())),
                Some(dev_object) if dev_object.hash != object.hash => modified.push((
                    object.logical_path.clone(),
                    (object.clone(), dev_object.clone()),
                )),
                Some(_) => {
                    result.consistent.insert(object.logical_path.clone());
                }
            }
        }
        let only_in_dev: Vec<(String, ContentObject)> = dev
            .iter()
            .filter(|object| !design.contains(&object.logical_path))
            .map(|object| (object.logical_path.clone(), object.clone()))
            .collect();
        debug!(
            consistent = result.consistent.len(),
            modified = modified.len(),
            only_in_design = only_in_design.len(),
            only_in_dev = only_in_dev.len(),
            "compared snapshots"
        );

        // Modified on both sides: the strictly newer dev change wins.
        let (by_dev, by_designers) = self
            .split_concurrently(modified, |vcs, (design_object, dev_object)| {
                let dev_time = checked_change_time(vcs, &dev_object)?;
                let design_time = checked_change_time(vcs, &design_object)?;
                Ok(design_time < dev_time)
            })
            .await?;
        result.modified_by_dev = by_dev;
        result.modified_by_designers = by_designers;

        // Only in dev: designers deleted it after dev last touched it?
        let design_repo = layout.design_repo.clone();
        let design_prefix = layout.design_prefix.clone();
        let (removed, added) = self
            .split_concurrently(only_in_dev, move |vcs, dev_object| {
                let dev_time = checked_change_time(vcs, &dev_object)?;
                let design_path = design_prefix.join(&dev_object.logical_path);
                let design_time = vcs.latest_change_time(&design_repo, &design_path)?;
                Ok(dev_time < design_time)
            })
            .await?;
        result.removed_by_designers = removed;
        result.added_by_dev = added;

        // Only in design: dev deleted it after designers last touched it?
        let dev_dir = layout.dev_dir.clone();
        let dev_roots = layout.dev_roots.clone();
        let (removed, added) = self
            .split_concurrently(only_in_design, move |vcs, design_object| {
                let Some(dev_time) =
                    dev_change_time(vcs, &dev_dir, &dev_roots, &design_object.logical_path)?
                else {
                    return Ok(false);
                };
                let design_time = checked_change_time(vcs, &design_object)?;
                Ok(design_time < dev_time)
            })
            .await?;
        result.removed_by_dev = removed;
        result.added_by_designers = added;

        info!(
            added_by_dev = result.added_by_dev.len(),
            removed_by_dev = result.removed_by_dev.len(),
            modified_by_dev = result.modified_by_dev.len(),
            added_by_designers = result.added_by_designers.len(),
            removed_by_designers = result.removed_by_designers.len(),
            modified_by_designers = result.modified_by_designers.len(),
            consistent = result.consistent.len(),
            "classification complete"
        );
        Ok(result)
    }

    /// Evaluate `predicate` for every item on the blocking pool and split the
    /// paths into `(matched, unmatched)`.
    ///
    /// Finished lookups are drained while waiting for a permit, so the first
    /// error returns immediately; dropping the `JoinSet` cancels lookups that
    /// have not started.
    async fn split_concurrently<T, F>(
        &self,
        items: Vec<(String, T)>,
        predicate: F,
    ) -> Result<(BTreeSet<String>, BTreeSet<String>), ReconcileError>
    where
        T: Send + 'static,
        F: Fn(&dyn VcsGateway, T) -> Result<bool, ReconcileError> + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut split = Split::default();

        for (path, item) in items {
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next() => split.record(joined)?,
                    permit = Arc::clone(&semaphore).acquire_owned() => {
                        break permit.map_err(|e| ReconcileError::TaskFailed(e.to_string()))?;
                    }
                }
            };
            let vcs = Arc::clone(&self.vcs);
            let predicate = Arc::clone(&predicate);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                predicate(vcs.as_ref(), item).map(|matched| (path, matched))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            split.record(joined)?;
        }
        Ok((split.matched, split.unmatched))
    }
}

type Lookup = Result<Result<(String, bool), ReconcileError>, tokio::task::JoinError>;

#[derive(Default)]
struct Split {
    matched: BTreeSet<String>,
    unmatched: BTreeSet<String>,
}

impl Split {
    fn record(&mut self, joined: Lookup) -> Result<(), ReconcileError> {
        let (path, hit) = joined.map_err(|e| ReconcileError::TaskFailed(e.to_string()))??;
        if hit {
            self.matched.insert(path);
        } else {
            self.unmatched.insert(path);
        }
        Ok(())
    }
}

/// Latest change time of a snapshot object, which must be positive.
fn checked_change_time(
    vcs: &dyn VcsGateway,
    object: &ContentObject,
) -> Result<i64, ReconcileError> {
    let time = vcs.latest_change_time(&object.repo, &object.repo_path)?;
    if time <= 0 {
        return Err(ReconcileError::NonPositiveChangeTime {
            object: object.to_string(),
            time,
        });
    }
    Ok(time)
}

/// First positive change time of `logical_path` among the dev roots.
///
/// Roots the path would escape (not an ancestor, or `..` traversal) are
/// skipped.
fn dev_change_time(
    vcs: &dyn VcsGateway,
    dev_dir: &Path,
    roots: &[PathBuf],
    logical_path: &str,
) -> Result<Option<i64>, ReconcileError> {
    let file = dev_dir.join(logical_path);
    for root in roots {
        let Ok(relative) = file.strip_prefix(root) else {
            continue;
        };
        if logical_path_of(relative).is_none() {
            continue;
        }
        let time = vcs.latest_change_time(root, relative)?;
        if time > 0 {
            return Ok(Some(time));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::snapshot::tests::FakeVcs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn object(repo: &str, path: &str, hash: &str) -> ContentObject {
        ContentObject {
            logical_path: path.to_string(),
            hash: hash.to_string(),
            repo: PathBuf::from(repo),
            repo_path: PathBuf::from(path),
        }
    }

    fn snapshot(repo: &str, entries: &[(&str, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(path, hash)| object(repo, path, hash))
            .collect()
    }

    fn layout() -> RepoLayout {
        RepoLayout::new(
            Path::new("/design"),
            Path::new("/design"),
            Path::new("/dev"),
            vec![PathBuf::from("/dev")],
        )
        .unwrap()
    }

    fn engine(vcs: FakeVcs) -> ReconciliationEngine {
        ReconciliationEngine::new(Arc::new(vcs), 4)
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_modified_tie_break_direction() {
        let design = snapshot("/design", &[("p.png", "d")]);
        let dev = snapshot("/dev", &[("p.png", "v")]);

        let vcs = FakeVcs::default()
            .time("/dev", "p.png", 100)
            .time("/design", "p.png", 50);
        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        assert_eq!(result.modified_by_dev, set(&["p.png"]));
        assert!(result.modified_by_designers.is_empty());

        let vcs = FakeVcs::default()
            .time("/dev", "p.png", 50)
            .time("/design", "p.png", 100);
        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        assert_eq!(result.modified_by_designers, set(&["p.png"]));
        assert!(result.modified_by_dev.is_empty());
    }

    #[tokio::test]
    async fn test_equal_times_favour_designers() {
        let design = snapshot("/design", &[("p.png", "d")]);
        let dev = snapshot("/dev", &[("p.png", "v")]);
        let vcs = FakeVcs::default()
            .time("/dev", "p.png", 70)
            .time("/design", "p.png", 70);
        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        assert_eq!(result.category_of("p.png"), Some(Category::ModifiedByDesigners));
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let design = snapshot("/design", &[("a", "hash1"), ("b", "hash2")]);
        let dev = snapshot("/dev", &[("a", "hash1"), ("c", "hash3")]);
        let vcs = FakeVcs::default()
            .time("/design", "b", 200)
            .time("/dev", "b", 100)
            .time("/dev", "c", 300)
            .time("/design", "c", 150);

        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        assert_eq!(result.consistent, set(&["a"]));
        assert_eq!(result.added_by_designers, set(&["b"]));
        assert_eq!(result.added_by_dev, set(&["c"]));
        assert!(result.removed_by_dev.is_empty());
        assert!(result.removed_by_designers.is_empty());
    }

    #[tokio::test]
    async fn test_removals_when_other_side_is_newer() {
        let design = snapshot("/design", &[("a", "hash1"), ("b", "hash2")]);
        let dev = snapshot("/dev", &[("a", "hash1"), ("c", "hash3")]);
        let vcs = FakeVcs::default()
            .time("/design", "b", 100)
            .time("/dev", "b", 200)
            .time("/dev", "c", 150)
            .time("/design", "c", 300);

        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        assert_eq!(result.removed_by_dev, set(&["b"]));
        assert_eq!(result.removed_by_designers, set(&["c"]));
        assert!(result.added_by_designers.is_empty());
        assert!(result.added_by_dev.is_empty());
    }

    #[tokio::test]
    async fn test_design_only_path_without_dev_history_stays_added() {
        let design = snapshot("/design", &[("new.png", "h")]);
        let dev = Snapshot::default();
        // No history at all for the design object either: never consulted.
        let result = engine(FakeVcs::default())
            .reconcile(&design, &dev, &layout())
            .await
            .unwrap();
        assert_eq!(result.added_by_designers, set(&["new.png"]));
    }

    #[tokio::test]
    async fn test_dev_history_found_in_nested_root() {
        let design = snapshot("/design", &[("community/x.png", "h")]);
        let dev = Snapshot::default();
        let vcs = FakeVcs::default()
            .time("/design", "community/x.png", 10)
            .time("/dev/community", "x.png", 20);
        let layout = RepoLayout::new(
            Path::new("/design"),
            Path::new("/design"),
            Path::new("/dev"),
            vec![PathBuf::from("/dev"), PathBuf::from("/dev/community")],
        )
        .unwrap();

        let result = engine(vcs).reconcile(&design, &dev, &layout).await.unwrap();
        assert_eq!(result.removed_by_dev, set(&["community/x.png"]));
    }

    #[test]
    fn test_dev_change_time_rejects_escaping_paths() {
        let vcs = FakeVcs::default()
            .time("/dev/sub", "../secret.png", 99)
            .time("/elsewhere", "x.png", 99);
        let roots = vec![PathBuf::from("/dev/sub"), PathBuf::from("/elsewhere")];
        assert_eq!(
            dev_change_time(&vcs, Path::new("/dev"), &roots, "secret.png").unwrap(),
            None
        );
        assert_eq!(
            dev_change_time(&vcs, Path::new("/dev/sub"), &roots, "../x.png").unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_non_positive_time_is_fatal() {
        let design = snapshot("/design", &[("p.png", "d")]);
        let dev = snapshot("/dev", &[("p.png", "v")]);
        let vcs = FakeVcs::default().time("/design", "p.png", 50);

        let err = engine(vcs)
            .reconcile(&design, &dev, &layout())
            .await
            .unwrap_err();
        match err {
            ReconcileError::NonPositiveChangeTime { object, time } => {
                assert_eq!(time, 0);
                assert!(object.contains("p.png"));
                assert!(object.contains("/dev"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_identical_snapshots_are_consistent() {
        let design = snapshot("/design", &[("a", "1"), ("b", "2")]);
        let dev = snapshot("/dev", &[("a", "1"), ("b", "2")]);
        let engine = engine(FakeVcs::default());
        for _ in 0..2 {
            let result = engine.reconcile(&design, &dev, &layout()).await.unwrap();
            assert!(!result.has_divergence());
            assert_eq!(result.consistent, set(&["a", "b"]));
        }
    }

    #[tokio::test]
    async fn test_partition_is_complete_and_disjoint() {
        let design = snapshot(
            "/design",
            &[("same", "1"), ("edit1", "a"), ("edit2", "b"), ("gone", "g"), ("new_d", "n")],
        );
        let dev = snapshot(
            "/dev",
            &[("same", "1"), ("edit1", "x"), ("edit2", "y"), ("new_v", "v"), ("old_v", "o")],
        );
        let vcs = FakeVcs::default()
            .time("/design", "edit1", 1)
            .time("/dev", "edit1", 2)
            .time("/design", "edit2", 3)
            .time("/dev", "edit2", 2)
            .time("/design", "gone", 5)
            .time("/dev", "gone", 6)
            .time("/design", "new_d", 5)
            .time("/dev", "new_v", 5)
            .time("/dev", "old_v", 5)
            .time("/design", "old_v", 6);

        let result = engine(vcs).reconcile(&design, &dev, &layout()).await.unwrap();
        let all: BTreeSet<&str> = design.paths().chain(dev.paths()).collect();
        assert_eq!(result.total(), all.len());
        for path in all {
            let hits = Category::ALL
                .iter()
                .filter(|c| result.get(**c).contains(path))
                .count();
            assert_eq!(hits, 1, "{path} classified {hits} times");
        }
        assert_eq!(result.category_of("edit1"), Some(Category::ModifiedByDev));
        assert_eq!(result.category_of("edit2"), Some(Category::ModifiedByDesigners));
        assert_eq!(result.category_of("gone"), Some(Category::RemovedByDev));
        assert_eq!(result.category_of("new_d"), Some(Category::AddedByDesigners));
        assert_eq!(result.category_of("new_v"), Some(Category::AddedByDev));
        assert_eq!(result.category_of("old_v"), Some(Category::RemovedByDesigners));
    }

    /// Counts history lookups made through an inner [`FakeVcs`].
    struct CountingVcs {
        inner: FakeVcs,
        lookups: AtomicUsize,
    }

    impl VcsGateway for CountingVcs {
        fn repo_root(&self, path: &Path) -> Result<PathBuf, GitError> {
            self.inner.repo_root(path)
        }

        fn sub_roots(&self, root: &Path) -> Result<Vec<PathBuf>, GitError> {
            self.inner.sub_roots(root)
        }

        fn list_tracked_objects(
            &self,
            repo: &Path,
            dir: &Path,
            predicate: &mut dyn FnMut(&Path) -> bool,
        ) -> Result<Vec<ContentObject>, GitError> {
            self.inner.list_tracked_objects(repo, dir, predicate)
        }

        fn latest_change_time(&self, repo: &Path, path: &Path) -> Result<i64, GitError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.latest_change_time(repo, path)
        }

        fn stage(&self, repo: &Path, added: &[PathBuf], removed: &[PathBuf]) -> Result<(), GitError> {
            self.inner.stage(repo, added, removed)
        }
    }

    #[tokio::test]
    async fn test_fatal_time_stops_remaining_lookups() {
        let paths: Vec<String> = (0..200).map(|i| format!("p{i:04}.png")).collect();
        let entries: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), "v")).collect();
        let dev = snapshot("/dev", &entries);
        let design = Snapshot::default();

        // p0000 has no history; every other path does.
        let mut inner = FakeVcs::default();
        for path in paths.iter().skip(1) {
            inner = inner.time("/dev", path, 100);
        }
        let vcs = Arc::new(CountingVcs {
            inner,
            lookups: AtomicUsize::new(0),
        });
        let engine = ReconciliationEngine::new(vcs.clone(), 1);

        let err = engine.reconcile(&design, &dev, &layout()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NonPositiveChangeTime { ref object, .. } if object.contains("p0000.png")));
        let lookups = vcs.lookups.load(Ordering::SeqCst);
        assert!(lookups < 10, "{lookups} lookups ran after the fatal result");
    }
}

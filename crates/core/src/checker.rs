//! End-to-end icon check: snapshots, reconciliation, optional sync, report.
//!
//! [`IconChecker`] wires the collaborators together. Each run is built fresh
//! from the current state of both working copies; nothing is cached between
//! runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::IconSyncConfig;
use crate::errors::{ConfigError, CoreError, GitError};
use crate::filter::{IconFilter, SkippedDirs, TestRootSet};
use crate::git::{GitGateway, VcsGateway};
use crate::image::{HeaderInspector, ImageInspector};
use crate::project_model::{ImlProjectModel, ProjectModel};
use crate::reconcile::{ReconciliationEngine, RepoLayout, DEFAULT_MAX_CONCURRENT_LOOKUPS};
use crate::report::{ErrorHandler, Report};
use crate::snapshot::SnapshotBuilder;
use crate::sync::{self, SyncExecutor};

/// Inputs of a single check run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Development repository, or a directory inside it.
    pub dev_dir: PathBuf,
    /// Design repository, or the icon directory inside it.
    pub icons_dir: PathBuf,
    /// Whole-name pattern of dev directories to skip.
    pub skip_dirs_pattern: Option<String>,
    /// Mirror dev-authored changes into the design repository.
    pub do_sync: bool,
    pub max_concurrent_lookups: usize,
}

impl CheckOptions {
    pub fn new(dev_dir: impl Into<PathBuf>, icons_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            icons_dir: icons_dir.into(),
            skip_dirs_pattern: None,
            do_sync: false,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }

    /// Options from a validated configuration.
    pub fn from_config(config: &IconSyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let missing = |field: &str| ConfigError::InvalidValue {
            field: field.into(),
            detail: "directory must be set".into(),
        };
        Ok(Self {
            dev_dir: config
                .repos
                .dev_dir
                .clone()
                .ok_or_else(|| missing("repos.dev_dir"))?,
            icons_dir: config
                .repos
                .icons_dir
                .clone()
                .ok_or_else(|| missing("repos.icons_dir"))?,
            skip_dirs_pattern: config.scan.skip_dirs_pattern.clone(),
            do_sync: config.sync.enabled,
            max_concurrent_lookups: config.sync.max_concurrent_lookups,
        })
    }
}

/// Runs icon checks against a pair of repositories.
pub struct IconChecker {
    vcs: Arc<dyn VcsGateway>,
    inspector: Arc<dyn ImageInspector>,
    project_model: Arc<dyn ProjectModel>,
}

impl IconChecker {
    pub fn new(
        vcs: Arc<dyn VcsGateway>,
        inspector: Arc<dyn ImageInspector>,
        project_model: Arc<dyn ProjectModel>,
    ) -> Self {
        Self {
            vcs,
            inspector,
            project_model,
        }
    }

    /// Checker backed by git2, image headers and `*.iml` module files.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(GitGateway),
            Arc::new(HeaderInspector),
            Arc::new(ImlProjectModel),
        )
    }

    /// Classify every icon of both repositories, optionally sync, and report.
    ///
    /// Returns an error when history is inconsistent, a repository cannot be
    /// opened, or `handler` rejects divergence of a read-only run. Sync
    /// failures only mark the report.
    #[instrument(skip_all, fields(dev = %options.dev_dir.display(), icons = %options.icons_dir.display(), sync = options.do_sync))]
    pub async fn run(
        &self,
        options: &CheckOptions,
        handler: &dyn ErrorHandler,
    ) -> Result<Report, CoreError> {
        let dev_dir = canonical_dir(&options.dev_dir)?;
        let icons_dir = canonical_dir(&options.icons_dir)?;
        let vcs = self.vcs.as_ref();

        let design_repo = vcs.repo_root(&icons_dir)?;
        let dev_repo = vcs.repo_root(&dev_dir)?;
        let dev_roots = vcs.sub_roots(&dev_repo)?;
        info!(
            design_repo = %design_repo.display(),
            dev_repo = %dev_repo.display(),
            dev_roots = dev_roots.len(),
            "resolved repositories"
        );

        let builder = SnapshotBuilder::new(vcs, IconFilter::new(self.inspector.as_ref()));
        let design = builder.design_snapshot(&design_repo, &icons_dir)?;

        let test_roots = self.project_model.test_roots(&dev_repo);
        info!(count = test_roots.len(), "found test roots");
        if let Some(pattern) = &options.skip_dirs_pattern {
            info!(pattern, "using pattern to skip dirs");
        }
        let test_roots = TestRootSet::new(test_roots, options.skip_dirs_pattern.as_deref())?;
        let mut skipped = SkippedDirs::default();
        let dev = builder.dev_snapshot(&dev_repo, &dev_dir, &dev_roots, &test_roots, &mut skipped)?;

        let layout = RepoLayout::new(&design_repo, &icons_dir, &dev_dir, dev_roots)?;
        let engine = ReconciliationEngine::new(Arc::clone(&self.vcs), options.max_concurrent_lookups);
        let classification = engine.reconcile(&design, &dev, &layout).await?;

        let mut report = Report::new(&classification, dev.len(), design.len(), skipped.len());
        if options.do_sync {
            let actions = sync::plan(&classification, &design, &dev, &icons_dir);
            let outcome = SyncExecutor::new(vcs).execute(&actions, &design_repo);
            if !outcome.is_success() {
                warn!(failures = outcome.failures.len(), "sync failed");
            }
            report = report.with_sync(&outcome);
        }

        report.check(handler)?;
        Ok(report)
    }
}

fn canonical_dir(dir: &Path) -> Result<PathBuf, GitError> {
    std::fs::canonicalize(dir).map_err(|_| GitError::RepositoryNotFound(dir.display().to_string()))
}

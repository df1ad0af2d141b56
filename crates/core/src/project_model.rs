//! Test-root discovery from IntelliJ module files.
//!
//! Every `*.iml` file under the project directory is scanned for
//! `<sourceFolder>` entries that are test sources or test resources.
//! Failures never abort a run: unreadable files are logged and skipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::xml;

/// Directory names never descended into while looking for module files.
const SKIPPED_WALK_DIRS: &[&str] = &[".git", "out", "node_modules", "target"];

/// Enumerates test source/resource directories of a project.
pub trait ProjectModel: Send + Sync {
    /// Test roots of the project rooted at `project_dir`. Fails open to an
    /// empty (or partial) set.
    fn test_roots(&self, project_dir: &Path) -> BTreeSet<PathBuf>;
}

/// [`ProjectModel`] reading IntelliJ `*.iml` module files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImlProjectModel;

impl ProjectModel for ImlProjectModel {
    fn test_roots(&self, project_dir: &Path) -> BTreeSet<PathBuf> {
        let mut roots = BTreeSet::new();
        let walker = WalkDir::new(project_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "cannot walk project directory");
                    continue;
                }
            };
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "iml")
            {
                roots.extend(module_test_roots(entry.path()));
            }
        }
        info!(project = %project_dir.display(), count = roots.len(), "found test roots");
        roots
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| SKIPPED_WALK_DIRS.contains(&n))
}

/// Test roots declared by one module file.
fn module_test_roots(iml: &Path) -> Vec<PathBuf> {
    let contents = match std::fs::read_to_string(iml) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(module = %iml.display(), error = %e, "cannot read module file");
            return Vec::new();
        }
    };
    let module_dir = iml.parent().unwrap_or(Path::new("."));
    let mut roots = Vec::new();
    for tag in xml::start_tags(&contents, "sourceFolder") {
        let is_test_source = xml::attribute(tag, "isTestSource").as_deref() == Some("true");
        let is_test_resource =
            xml::attribute(tag, "type").as_deref() == Some("java-test-resource");
        if !is_test_source && !is_test_resource {
            continue;
        }
        let Some(url) = xml::attribute(tag, "url") else {
            continue;
        };
        let Some(path) = resolve_module_url(&url, module_dir) else {
            debug!(module = %iml.display(), url, "ignoring unsupported source folder url");
            continue;
        };
        // Roots that do not exist cannot contain tracked files.
        if let Ok(path) = std::fs::canonicalize(&path) {
            roots.push(path);
        }
    }
    roots
}

/// Resolve `file://$MODULE_DIR$/...` against the module directory.
fn resolve_module_url(url: &str, module_dir: &Path) -> Option<PathBuf> {
    let path = url.strip_prefix("file://")?;
    match path.strip_prefix("$MODULE_DIR$") {
        Some(rest) => Some(module_dir.join(rest.trim_start_matches('/'))),
        None if Path::new(path).is_absolute() => Some(PathBuf::from(path)),
        None => None,
    }
}

//! Local Git repository operations via `git2`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, Oid, Repository, Sort, Tree};
use tracing::{debug, info, instrument, warn};

use super::VcsGateway;
use crate::errors::GitError;
use crate::models::{logical_path_of, ContentObject};
use crate::xml;

/// Index mode of a submodule entry.
const GITLINK_MODE: u32 = 0o160000;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository whose work tree is `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        debug!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let repo_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(Self { repo, repo_path })
    }

    /// Open the repository containing `path`, searching upwards.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.display().to_string()))?;
        let repo_path = std::fs::canonicalize(workdir)?;
        Ok(Self { repo, repo_path })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Enumerate index entries under `dir` accepted by `predicate`.
    ///
    /// `predicate` receives the absolute path of each candidate file.
    pub fn tracked_objects(
        &self,
        dir: &Path,
        predicate: &mut dyn FnMut(&Path) -> bool,
    ) -> Result<Vec<ContentObject>, GitError> {
        let index = self.repo.index()?;
        let mut objects = Vec::new();
        for entry in index.iter() {
            if entry.mode == GITLINK_MODE {
                continue;
            }
            let Ok(raw) = std::str::from_utf8(&entry.path) else {
                warn!(path = %String::from_utf8_lossy(&entry.path), "skipping non-UTF-8 path");
                continue;
            };
            let repo_path = PathBuf::from(raw);
            let file = self.repo_path.join(&repo_path);
            let Ok(relative) = file.strip_prefix(dir) else {
                continue;
            };
            let Some(logical_path) = logical_path_of(relative) else {
                continue;
            };
            if !predicate(&file) {
                continue;
            }
            objects.push(ContentObject {
                logical_path,
                hash: entry.id.to_string(),
                repo: self.repo_path.clone(),
                repo_path,
            });
        }
        debug!(
            repo = %self.repo_path.display(),
            dir = %dir.display(),
            count = objects.len(),
            "listed tracked objects"
        );
        Ok(objects)
    }

    /// Commit time of the newest commit reachable from HEAD whose tree entry
    /// for `path` differs from its first parent's. `0` without history.
    pub fn latest_change_time(&self, path: &Path) -> Result<i64, GitError> {
        match self.repo.head() {
            Ok(_) => {}
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(0)
            }
            Err(e) => return Err(e.into()),
        }
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME)?;
        for oid_result in revwalk {
            let commit = self.repo.find_commit(oid_result?)?;
            let current = entry_id(&commit.tree()?, path);
            let previous = if commit.parent_count() == 0 {
                None
            } else {
                entry_id(&commit.parent(0)?.tree()?, path)
            };
            if current != previous {
                return Ok(commit.time().seconds());
            }
        }
        Ok(0)
    }

    /// Repositories nested under this work tree, excluding itself.
    ///
    /// Sources: `.idea/vcs.xml` Git mappings and registered submodules.
    pub fn nested_roots(&self) -> Result<BTreeSet<PathBuf>, GitError> {
        let mut candidates = BTreeSet::new();

        let vcs_xml = self.repo_path.join(".idea").join("vcs.xml");
        match std::fs::read_to_string(&vcs_xml) {
            Ok(contents) => {
                for tag in xml::start_tags(&contents, "mapping") {
                    if xml::attribute(tag, "vcs").as_deref() != Some("Git") {
                        continue;
                    }
                    if let Some(dir) = xml::attribute(tag, "directory") {
                        let project_dir = self.repo_path.display().to_string();
                        candidates.insert(PathBuf::from(dir.replace("$PROJECT_DIR$", &project_dir)));
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %vcs_xml.display(), error = %e, "cannot read vcs mappings"),
        }

        for submodule in self.repo.submodules()? {
            candidates.insert(self.repo_path.join(submodule.path()));
        }

        let mut roots = BTreeSet::new();
        for candidate in candidates {
            match std::fs::canonicalize(&candidate) {
                Ok(path) if path != self.repo_path && Repository::open(&path).is_ok() => {
                    roots.insert(path);
                }
                Ok(path) if path == self.repo_path => {}
                _ => warn!(path = %candidate.display(), "skipping unusable nested root"),
            }
        }
        Ok(roots)
    }

    /// Stage copied files and drop deleted ones from the index.
    #[instrument(skip(self, added, removed), fields(repo = %self.repo_path.display()))]
    pub fn stage(&self, added: &[PathBuf], removed: &[PathBuf]) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        for path in added {
            index.add_path(path)?;
        }
        for path in removed {
            index.remove_path(path)?;
        }
        index.write()?;
        info!(added = added.len(), removed = removed.len(), "staged changes");
        Ok(())
    }
}

fn entry_id(tree: &Tree<'_>, path: &Path) -> Option<Oid> {
    tree.get_path(path).ok().map(|entry| entry.id())
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// [`VcsGateway`] opening a fresh [`GitClient`] per call.
///
/// `git2::Repository` is not `Sync`, so concurrent history lookups each get
/// their own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitGateway;

impl VcsGateway for GitGateway {
    fn repo_root(&self, path: &Path) -> Result<PathBuf, GitError> {
        Ok(GitClient::discover(path)?.repo_path)
    }

    fn sub_roots(&self, root: &Path) -> Result<Vec<PathBuf>, GitError> {
        let client = GitClient::new(root)?;
        let mut roots = vec![client.repo_path.clone()];
        roots.extend(client.nested_roots()?);
        debug!(root = %root.display(), count = roots.len(), "resolved vcs roots");
        Ok(roots)
    }

    fn list_tracked_objects(
        &self,
        repo: &Path,
        dir: &Path,
        predicate: &mut dyn FnMut(&Path) -> bool,
    ) -> Result<Vec<ContentObject>, GitError> {
        GitClient::new(repo)?.tracked_objects(dir, predicate)
    }

    fn latest_change_time(&self, repo: &Path, path: &Path) -> Result<i64, GitError> {
        GitClient::new(repo)?.latest_change_time(path)
    }

    fn stage(&self, repo: &Path, added: &[PathBuf], removed: &[PathBuf]) -> Result<(), GitError> {
        GitClient::new(repo)?.stage(added, removed)
    }
}

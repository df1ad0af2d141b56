//! Shared data types: content objects, snapshots, and the classification.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Content objects
// ---------------------------------------------------------------------------

/// A tracked file, identified across repositories by its logical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    /// Forward-slash path relative to the scanned directory.
    pub logical_path: String,
    /// Blob id. Compared for equality only.
    pub hash: String,
    /// Work-tree root of the repository that tracks the file.
    pub repo: PathBuf,
    /// Path of the file relative to `repo`.
    pub repo_path: PathBuf,
}

impl ContentObject {
    /// Absolute path of the file in its work tree.
    pub fn file(&self) -> PathBuf {
        self.repo.join(&self.repo_path)
    }
}

impl fmt::Display for ContentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} in {}, {})",
            self.logical_path,
            self.repo_path.display(),
            self.repo.display(),
            self.hash
        )
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable mapping from logical path to content object for one side.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    objects: BTreeMap<String, ContentObject>,
}

impl Snapshot {
    /// Insert an object unless its logical path is already present.
    ///
    /// Returns `false` (and keeps the existing object) on a duplicate.
    pub(crate) fn insert_first(&mut self, object: ContentObject) -> bool {
        use std::collections::btree_map::Entry;
        match self.objects.entry(object.logical_path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(object);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, logical_path: &str) -> Option<&ContentObject> {
        self.objects.get(logical_path)
    }

    pub fn contains(&self, logical_path: &str) -> bool {
        self.objects.contains_key(logical_path)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentObject> {
        self.objects.values()
    }
}

impl FromIterator<ContentObject> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ContentObject>>(iter: I) -> Self {
        let mut snapshot = Snapshot::default();
        for object in iter {
            snapshot.insert_first(object);
        }
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Authorship/action bucket for a diverging (or consistent) logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AddedByDev,
    RemovedByDev,
    ModifiedByDev,
    AddedByDesigners,
    RemovedByDesigners,
    ModifiedByDesigners,
    Consistent,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::AddedByDev,
        Self::RemovedByDev,
        Self::ModifiedByDev,
        Self::AddedByDesigners,
        Self::RemovedByDesigners,
        Self::ModifiedByDesigners,
        Self::Consistent,
    ];

    /// `true` for every category except [`Category::Consistent`].
    pub fn is_divergent(self) -> bool {
        self != Self::Consistent
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddedByDev => write!(f, "added by dev"),
            Self::RemovedByDev => write!(f, "removed by dev"),
            Self::ModifiedByDev => write!(f, "modified by dev"),
            Self::AddedByDesigners => write!(f, "added by designers"),
            Self::RemovedByDesigners => write!(f, "removed by designers"),
            Self::ModifiedByDesigners => write!(f, "modified by designers"),
            Self::Consistent => write!(f, "consistent"),
        }
    }
}

/// Seven pairwise-disjoint sets of logical paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub added_by_dev: BTreeSet<String>,
    pub removed_by_dev: BTreeSet<String>,
    pub modified_by_dev: BTreeSet<String>,
    pub added_by_designers: BTreeSet<String>,
    pub removed_by_designers: BTreeSet<String>,
    pub modified_by_designers: BTreeSet<String>,
    pub consistent: BTreeSet<String>,
}

impl ClassificationResult {
    pub fn get(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::AddedByDev => &self.added_by_dev,
            Category::RemovedByDev => &self.removed_by_dev,
            Category::ModifiedByDev => &self.modified_by_dev,
            Category::AddedByDesigners => &self.added_by_designers,
            Category::RemovedByDesigners => &self.removed_by_designers,
            Category::ModifiedByDesigners => &self.modified_by_designers,
            Category::Consistent => &self.consistent,
        }
    }

    /// Category of `logical_path`, if it was classified at all.
    pub fn category_of(&self, logical_path: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.get(*c).contains(logical_path))
    }

    /// Total number of classified paths.
    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }

    /// `true` when at least one divergent category is non-empty.
    pub fn has_divergence(&self) -> bool {
        Category::ALL
            .iter()
            .any(|c| c.is_divergent() && !self.get(*c).is_empty())
    }
}

/// Normalize a relative path into the forward-slash logical form.
///
/// Returns `None` for paths with traversal, root, or prefix components.
pub fn logical_path_of(relative: &Path) -> Option<String> {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(path: &str, hash: &str) -> ContentObject {
        ContentObject {
            logical_path: path.to_string(),
            hash: hash.to_string(),
            repo: PathBuf::from("/repo"),
            repo_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_snapshot_keeps_first_duplicate() {
        let snapshot: Snapshot = vec![object("a.png", "1"), object("a.png", "2")]
            .into_iter()
            .collect();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a.png").unwrap().hash, "1");
    }

    #[test]
    fn test_category_of_and_divergence() {
        let mut result = ClassificationResult::default();
        result.consistent.insert("a.png".into());
        assert!(!result.has_divergence());
        assert_eq!(result.category_of("a.png"), Some(Category::Consistent));

        result.removed_by_designers.insert("b.png".into());
        assert!(result.has_divergence());
        assert_eq!(result.category_of("b.png"), Some(Category::RemovedByDesigners));
        assert_eq!(result.category_of("c.png"), None);
        assert_eq!(result.total(), 2);
    }

    #[test]
    fn test_logical_path_normalization() {
        assert_eq!(
            logical_path_of(Path::new("./icons/a.png")).as_deref(),
            Some("icons/a.png")
        );
        assert_eq!(logical_path_of(Path::new("../a.png")), None);
        assert_eq!(logical_path_of(Path::new("icons/../../a.png")), None);
        assert_eq!(logical_path_of(Path::new("")), None);
    }

    #[test]
    fn test_content_object_display_names_path() {
        let text = object("icons/a.png", "abc").to_string();
        assert!(text.contains("icons/a.png"));
        assert!(text.contains("abc"));
    }
}

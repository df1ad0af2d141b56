//! Icon candidate filtering.
//!
//! [`IconFilter`] decides whether a tracked file is an icon. On the dev side
//! a [`TestRootSet`] additionally excludes files under test roots or under
//! directories whose name matches the skip pattern.
//!
//! # Decision model
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | File or ancestor dir is a test root / matches the skip pattern | `Excluded` |
//! | Not an image | `NotImage` |
//! | Header cannot be decoded | `Undecodable` |
//! | Width or height above the limit (32, or 64 for `@2x`) | `Oversize` |
//! | None of the above | `Icon` |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::{debug, warn};

use crate::errors::ConfigError;
use crate::image::ImageInspector;

/// File-name marker of double-density images.
pub const DOUBLE_DENSITY_MARKER: &str = "@2x";
/// Maximum side of a regular icon, in pixels.
pub const ICON_SIZE: u64 = 32;
/// Maximum side of a double-density icon, in pixels.
pub const DOUBLE_DENSITY_ICON_SIZE: u64 = 64;

// ---------------------------------------------------------------------------
// Decision enum
// ---------------------------------------------------------------------------

/// The outcome of evaluating a file as an icon candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconDecision {
    /// Small decodable image.
    Icon,
    /// Under an excluded directory (recorded in [`SkippedDirs`]).
    Excluded { dir: PathBuf },
    /// Not an image file.
    NotImage,
    /// Looked like an image but its header could not be read.
    Undecodable,
    /// Image larger than the size limit.
    Oversize { width: u64, height: u64, limit: u64 },
}

impl IconDecision {
    pub fn is_icon(&self) -> bool {
        matches!(self, Self::Icon)
    }

    /// Short human-readable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Icon => "icon",
            Self::Excluded { .. } => "excluded",
            Self::NotImage => "not-image",
            Self::Undecodable => "undecodable",
            Self::Oversize { .. } => "oversize",
        }
    }
}

// ---------------------------------------------------------------------------
// Skipped directories
// ---------------------------------------------------------------------------

/// Directories excluded while building the dev snapshot. Diagnostic only.
#[derive(Debug, Clone, Default)]
pub struct SkippedDirs {
    dirs: BTreeSet<PathBuf>,
}

impl SkippedDirs {
    pub fn record(&mut self, dir: &Path) {
        if !self.dirs.contains(dir) {
            debug!(dir = %dir.display(), "skipping directory");
            self.dirs.insert(dir.to_path_buf());
        }
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }
}

// ---------------------------------------------------------------------------
// Test roots
// ---------------------------------------------------------------------------

/// Known test roots plus an optional directory-name pattern.
#[derive(Debug, Clone, Default)]
pub struct TestRootSet {
    roots: BTreeSet<PathBuf>,
    skip_pattern: Option<Regex>,
}

impl TestRootSet {
    /// `skip_pattern` must match a whole directory name.
    pub fn new(roots: BTreeSet<PathBuf>, skip_pattern: Option<&str>) -> Result<Self, ConfigError> {
        let skip_pattern = skip_pattern.map(compile_skip_pattern).transpose()?;
        Ok(Self {
            roots,
            skip_pattern,
        })
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.skip_pattern.is_none()
    }

    fn matches_dir(&self, dir: &Path) -> bool {
        if self.roots.contains(dir) {
            return true;
        }
        match (&self.skip_pattern, dir.file_name().and_then(|n| n.to_str())) {
            (Some(pattern), Some(name)) => pattern.is_match(name),
            _ => false,
        }
    }

    /// First excluded directory among `file` (when it is a directory) and
    /// its ancestors, walking up to the filesystem root. Records the match.
    pub fn excluding_dir(&self, file: &Path, skipped: &mut SkippedDirs) -> Option<PathBuf> {
        let mut current = if file.is_dir() {
            Some(file)
        } else {
            file.parent()
        };
        while let Some(dir) = current {
            if self.matches_dir(dir) {
                skipped.record(dir);
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }
        None
    }
}

/// Compile a skip pattern anchored to the whole directory name.
pub fn compile_skip_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ConfigError::InvalidValue {
        field: "scan.skip_dirs_pattern".into(),
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// IconFilter
// ---------------------------------------------------------------------------

/// Evaluates files as icon candidates. Never fails: undecodable images are
/// logged and rejected.
pub struct IconFilter<'a> {
    inspector: &'a dyn ImageInspector,
}

impl<'a> IconFilter<'a> {
    pub fn new(inspector: &'a dyn ImageInspector) -> Self {
        Self { inspector }
    }

    /// Largest allowed side for `file`.
    pub fn size_limit(file: &Path) -> u64 {
        let double_density = file
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(DOUBLE_DENSITY_MARKER));
        if double_density {
            DOUBLE_DENSITY_ICON_SIZE
        } else {
            ICON_SIZE
        }
    }

    /// Design-side evaluation: image checks only.
    pub fn evaluate(&self, file: &Path) -> IconDecision {
        if !self.inspector.is_image(file) {
            return IconDecision::NotImage;
        }
        let (width, height) = match self.inspector.dimensions(file) {
            Ok(Some(size)) => size,
            Ok(None) => return IconDecision::Undecodable,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "cannot read image size");
                return IconDecision::Undecodable;
            }
        };
        let limit = Self::size_limit(file);
        if width <= limit && height <= limit {
            IconDecision::Icon
        } else {
            IconDecision::Oversize {
                width,
                height,
                limit,
            }
        }
    }

    /// Dev-side evaluation: test-root exclusion first, then image checks.
    pub fn evaluate_dev(
        &self,
        file: &Path,
        test_roots: &TestRootSet,
        skipped: &mut SkippedDirs,
    ) -> IconDecision {
        match test_roots.excluding_dir(file, skipped) {
            Some(dir) => IconDecision::Excluded { dir },
            None => self.evaluate(file),
        }
    }
}

//! TOML-based configuration for iconsync.
//!
//! Every section is optional in the file; command-line flags override the
//! loaded values (see the CLI). Directory paths are not checked for
//! existence here, only for presence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::filter::compile_skip_pattern;
use crate::reconcile::DEFAULT_MAX_CONCURRENT_LOOKUPS;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IconSyncConfig {
    /// Repository locations.
    #[serde(default)]
    pub repos: ReposConfig,

    /// Dev-side scanning settings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Sync behaviour settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Repos
// ---------------------------------------------------------------------------

/// The two working copies being compared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReposConfig {
    /// Development repository (or a directory inside it).
    #[serde(default)]
    pub dev_dir: Option<PathBuf>,

    /// Design repository (or the icon directory inside it).
    #[serde(default)]
    pub icons_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Regex matched against whole directory names; matching directories
    /// are excluded from the dev snapshot in addition to test roots.
    #[serde(default)]
    pub skip_dirs_pattern: Option<String>,
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Mirror dev-authored changes into the design repository.
    #[serde(default)]
    pub enabled: bool,

    /// Upper bound on concurrent history lookups (default 16).
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
}

fn default_max_concurrent_lookups() -> usize {
    DEFAULT_MAX_CONCURRENT_LOOKUPS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl IconSyncConfig {
    /// Load an [`IconSyncConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: IconSyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that values are present and sane.
    ///
    /// Both repository directories must be set by the time a check runs, so
    /// callers merging command-line overrides validate afterwards.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_dir(&self.repos.dev_dir, "repos.dev_dir")?;
        require_dir(&self.repos.icons_dir, "repos.icons_dir")?;

        if let Some(pattern) = &self.scan.skip_dirs_pattern {
            compile_skip_pattern(pattern)?;
        }
        if self.sync.max_concurrent_lookups == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.max_concurrent_lookups".into(),
                detail: "must be > 0".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log.level".into(),
                detail: format!(
                    "unknown level '{}', expected one of {}",
                    self.log.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// A commented starter file, as written by `iconsync init`.
    pub fn template() -> &'static str {
        TEMPLATE
    }
}

fn require_dir(value: &Option<PathBuf>, field: &str) -> Result<(), ConfigError> {
    match value {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "directory must be set".into(),
        }),
    }
}

const TEMPLATE: &str = r#"# iconsync configuration

[repos]
# Development repository (nested git roots are discovered automatically).
dev_dir = "~/work/product"
# Design repository holding the canonical icon set.
icons_dir = "~/work/icons"

[scan]
# Directory names to exclude from the dev scan, in addition to test roots.
# skip_dirs_pattern = "testData|build"

[sync]
# Copy dev-authored changes into the design repository.
enabled = false
max_concurrent_lookups = 16

[log]
level = "info"
"#;

//! Run reports and divergence handling.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::errors::CoreError;
use crate::models::{Category, ClassificationResult};
use crate::sync::SyncOutcome;

/// Paths of one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub count: usize,
    pub paths: Vec<String>,
}

/// Outcome of one check run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub dev_icons: usize,
    pub design_icons: usize,
    pub skipped_dirs: usize,
    pub sync_requested: bool,
    pub sync_failed: bool,
    /// Messages of failed sync actions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sync_errors: Vec<String>,
    /// One entry per category, in [`Category::ALL`] order.
    pub categories: Vec<CategoryReport>,
}

impl Report {
    pub fn new(
        classification: &ClassificationResult,
        dev_icons: usize,
        design_icons: usize,
        skipped_dirs: usize,
    ) -> Self {
        let categories = Category::ALL
            .into_iter()
            .map(|category| {
                let paths: Vec<String> = classification.get(category).iter().cloned().collect();
                CategoryReport {
                    category,
                    count: paths.len(),
                    paths,
                }
            })
            .collect();
        Self {
            generated_at: Utc::now(),
            dev_icons,
            design_icons,
            skipped_dirs,
            sync_requested: false,
            sync_failed: false,
            sync_errors: Vec::new(),
            categories,
        }
    }

    /// Record a sync attempt.
    pub fn with_sync(mut self, outcome: &SyncOutcome) -> Self {
        self.sync_requested = true;
        self.sync_failed = !outcome.is_success();
        self.sync_errors = outcome.failures.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn count(&self, category: Category) -> usize {
        self.paths(category).len()
    }

    pub fn paths(&self, category: Category) -> &[String] {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_divergence(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.category.is_divergent() && c.count > 0)
    }

    /// Non-empty divergent categories with their paths.
    pub fn divergence_summary(&self) -> String {
        let mut output = String::new();
        for c in self
            .categories
            .iter()
            .filter(|c| c.category.is_divergent() && c.count > 0)
        {
            let _ = writeln!(output, "{} ({}):", c.category, c.count);
            for path in &c.paths {
                let _ = writeln!(output, "  {path}");
            }
        }
        output
    }

    /// Plain-text summary: totals, per-category counts and divergent paths.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        output.push_str("=== Icon Sync Summary ===\n");
        let _ = writeln!(output, "Dev icons:     {}", self.dev_icons);
        let _ = writeln!(output, "Design icons:  {}", self.design_icons);
        let _ = writeln!(output, "Skipped dirs:  {}", self.skipped_dirs);
        output.push('\n');
        for c in &self.categories {
            let _ = writeln!(output, "{:<22}{}", format!("{}:", c.category), c.count);
        }

        let divergence = self.divergence_summary();
        if !divergence.is_empty() {
            output.push('\n');
            output.push_str(&divergence);
        }

        if self.sync_requested {
            output.push('\n');
            if self.sync_failed {
                let _ = writeln!(output, "Sync: failed ({} errors)", self.sync_errors.len());
                for error in &self.sync_errors {
                    let _ = writeln!(output, "  - {error}");
                }
            } else {
                output.push_str("Sync: done\n");
            }
        }
        output
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Hand unresolved divergence of a read-only run to `handler`.
    pub fn check(&self, handler: &dyn ErrorHandler) -> Result<(), CoreError> {
        if self.sync_requested || !self.has_divergence() {
            return Ok(());
        }
        handler.on_divergence(&self.divergence_summary())
    }
}

/// Receives the divergence summary of a read-only run.
pub trait ErrorHandler: Send + Sync {
    fn on_divergence(&self, summary: &str) -> Result<(), CoreError>;
}

/// Treats any divergence as a failed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOnDivergence;

impl ErrorHandler for FailOnDivergence {
    fn on_divergence(&self, summary: &str) -> Result<(), CoreError> {
        Err(CoreError::Divergence(summary.to_string()))
    }
}

/// Logs divergence and lets the run succeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDivergence;

impl ErrorHandler for LogDivergence {
    fn on_divergence(&self, summary: &str) -> Result<(), CoreError> {
        warn!(summary, "icons are not in sync");
        Ok(())
    }
}

//! Routes changed files to the analyzer that understands them.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::git::change::ChangeRecord;

/// Default suffix of Apex class files.
pub const DEFAULT_APEX_EXTENSION: &str = ".cls";

/// Default suffix of JavaScript files.
pub const DEFAULT_JS_EXTENSION: &str = ".js";

/// File suffixes selecting each analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFilters {
    /// Suffix routed to PMD.
    pub apex: String,
    /// Suffix routed to ESLint.
    pub js: String,
}

impl Default for ExtensionFilters {
    fn default() -> Self {
        Self {
            apex: DEFAULT_APEX_EXTENSION.to_string(),
            js: DEFAULT_JS_EXTENSION.to_string(),
        }
    }
}

impl ExtensionFilters {
    /// Builds filters, adding a leading dot where missing (`cls` becomes `.cls`).
    pub fn new(apex: &str, js: &str) -> Self {
        Self {
            apex: normalize_extension(apex),
            js: normalize_extension(js),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Per-analyzer file lists, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// Files for PMD.
    pub apex_files: Vec<String>,
    /// Files for ESLint.
    pub js_files: Vec<String>,
}

impl RoutingResult {
    /// Returns true when no analyzer has anything to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apex_files.is_empty() && self.js_files.is_empty()
    }

    /// Total number of routed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apex_files.len() + self.js_files.len()
    }

    /// Drops every path matched by `excluded`, keeping the order of the rest.
    pub fn exclude(&mut self, excluded: &GlobSet) {
        if excluded.is_empty() {
            return;
        }
        self.apex_files.retain(|p| !excluded.is_match(p));
        self.js_files.retain(|p| !excluded.is_match(p));
    }
}

/// Classifies change records into analyzer file lists.
///
/// Deletions are skipped. Renames and copies contribute their new path only.
/// Each filter is tested on its own, so a path can land in more than one list
/// if the suffixes overlap.
pub fn classify(records: &[ChangeRecord], filters: &ExtensionFilters) -> RoutingResult {
    let mut result = RoutingResult::default();

    for path in records.iter().filter_map(ChangeRecord::effective_path) {
        if path.ends_with(&filters.apex) {
            result.apex_files.push(path.to_string());
        }
        if path.ends_with(&filters.js) {
            result.js_files.push(path.to_string());
        }
    }

    tracing::debug!(
        "Routed {} apex and {} js file(s) from {} record(s)",
        result.apex_files.len(),
        result.js_files.len(),
        records.len()
    );

    result
}

/// Compiles exclusion globs into a matcher.
pub fn build_exclude_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("Invalid exclude pattern '{pattern}': {e}"))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build exclude patterns: {e}"))
}

//! PMD static analysis for Apex.

use std::path::Path;

use super::ToolInvocation;

/// Builds `pmd check` over the files listed in `file_list`.
///
/// PMD exits with status 4 when violations are found.
pub fn check_invocation(pmd: &str, file_list: &Path, ruleset: &str) -> ToolInvocation {
    ToolInvocation::from_command(pmd).arg("check").args([
        "--file-list".to_string(),
        file_list.display().to_string(),
        "--rulesets".to_string(),
        ruleset.to_string(),
        "--format".to_string(),
        "text".to_string(),
        "--no-progress".to_string(),
    ])
}

//! Preflight validation checks for early failure detection
//!
//! These checks run before any analyzer is invoked. Every failure here is
//! fatal: the run stops and the process exits with status 1.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::config::RunConfig;
use crate::routing::RoutingResult;

/// Unrecoverable precondition failures.
#[derive(Error, Debug)]
pub enum PreflightError {
    /// The working directory is not inside a git repository.
    #[error("Not in a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// A required external tool could not be executed.
    #[error("Required tool '{tool}' is not installed or not in PATH ({purpose})")]
    ToolMissing {
        /// Command that was probed.
        tool: String,
        /// What the tool is needed for.
        purpose: &'static str,
    },

    /// The target branch does not resolve locally or on `origin`.
    #[error("Target branch '{0}' not found (tried '{0}' and 'origin/{0}')")]
    TargetNotFound(String),

    /// Deployment validation is enabled but no org alias was given.
    #[error("No target org alias given. Pass --alias=<org>, set PRV_ORG_ALIAS, or use --skip-deploy")]
    MissingAlias,
}

/// Validates we're in a valid git repository
pub fn check_git_repository(path: &Path) -> Result<crate::git::GitRepository, PreflightError> {
    crate::git::GitRepository::open_at(path)
        .map_err(|_| PreflightError::NotARepository(path.to_path_buf()))
}

/// Validates that `tool --version` can be executed
///
/// `tool` may carry a launcher prefix such as `npx eslint`.
pub fn check_tool(tool: &str, purpose: &'static str) -> Result<(), PreflightError> {
    let (program, args) = crate::tools::split_command(tool);
    let probe = Command::new(program)
        .args(args)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match probe {
        // Some tools exit non-zero for --version; being able to spawn them is enough.
        Ok(status) => {
            tracing::debug!("{tool} --version exited with {status}");
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Failed to spawn {tool}: {e}");
            Err(PreflightError::ToolMissing {
                tool: tool.to_string(),
                purpose,
            })
        }
    }
}

/// Validates that an org alias is present when deployment validation is enabled
pub fn check_alias(config: &RunConfig) -> Result<(), PreflightError> {
    if config.deploy && config.alias.is_none() {
        return Err(PreflightError::MissingAlias);
    }
    Ok(())
}

/// Validates the tools needed for the stages this run will execute
///
/// PMD is only required when Apex files were routed, ESLint only when
/// JavaScript files were routed, and `sf` only when deployment validation is
/// enabled.
pub fn check_stage_tools(config: &RunConfig, routing: &RoutingResult) -> Result<(), PreflightError> {
    for (tool, purpose) in required_tools(config, routing) {
        check_tool(tool, purpose)?;
    }
    Ok(())
}

fn required_tools<'a>(
    config: &'a RunConfig,
    routing: &RoutingResult,
) -> Vec<(&'a str, &'static str)> {
    let mut tools = Vec::new();
    if !routing.apex_files.is_empty() {
        tools.push((config.tools.pmd.as_str(), "Apex static analysis"));
    }
    if !routing.js_files.is_empty() {
        tools.push((config.tools.eslint.as_str(), "JavaScript linting"));
    }
    if config.deploy {
        tools.push((config.tools.sf.as_str(), "deployment validation"));
    }
    tools
}

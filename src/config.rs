//! Run configuration.
//!
//! Every stage receives the same immutable [`RunConfig`]. It is resolved once
//! per invocation: command-line flags first, then the layers described in
//! [`layers`], then hardcoded defaults.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::data::report::OutputFormat;
use crate::routing::{ExtensionFilters, DEFAULT_APEX_EXTENSION, DEFAULT_JS_EXTENSION};

pub mod layers;

pub use layers::{ConfigLayers, ValueSource};

/// Target branch key.
pub const KEY_TARGET_BRANCH: &str = "PRV_TARGET_BRANCH";
/// Org alias key.
pub const KEY_ORG_ALIAS: &str = "PRV_ORG_ALIAS";
/// Apex extension key.
pub const KEY_APEX_EXT: &str = "PRV_APEX_EXT";
/// JavaScript extension key.
pub const KEY_JS_EXT: &str = "PRV_JS_EXT";
/// PMD ruleset key.
pub const KEY_PMD_RULESET: &str = "PRV_PMD_RULESET";
/// Comma-separated test classes key.
pub const KEY_TESTS: &str = "PRV_TESTS";
/// Exit-code policy key.
pub const KEY_FAIL_ON: &str = "PRV_FAIL_ON";
/// Comma-separated exclude globs key.
pub const KEY_EXCLUDE: &str = "PRV_EXCLUDE";
/// Source directory passed to the delta generator.
pub const KEY_SOURCE_DIR: &str = "PRV_SOURCE_DIR";
/// Deployment wait (minutes) key.
pub const KEY_DEPLOY_WAIT: &str = "PRV_DEPLOY_WAIT";
/// PMD executable key.
pub const KEY_PMD_BIN: &str = "PRV_PMD_BIN";
/// ESLint executable key.
pub const KEY_ESLINT_BIN: &str = "PRV_ESLINT_BIN";
/// Salesforce CLI executable key.
pub const KEY_SF_BIN: &str = "PRV_SF_BIN";

/// Branch compared against when nothing else is configured.
pub const DEFAULT_TARGET_BRANCH: &str = "main";
/// PMD's bundled Apex quickstart ruleset.
pub const DEFAULT_PMD_RULESET: &str = "rulesets/apex/quickstart.xml";
/// Minutes `sf project deploy validate` waits for the org.
pub const DEFAULT_DEPLOY_WAIT: u32 = 33;

/// Invalid configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be interpreted.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Key or flag name.
        key: String,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// Which failures turn into a non-zero exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    /// Always exit 0 once preconditions pass.
    #[default]
    Never,
    /// Exit 2 when the validate-only deployment fails.
    Deploy,
    /// Exit 2 when an analyzer reports findings.
    Findings,
    /// Exit 2 on any failed stage.
    Any,
}

impl std::str::FromStr for FailOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <FailOn as ValueEnum>::from_str(s, true)
    }
}

impl fmt::Display for FailOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailOn::Never => write!(f, "never"),
            FailOn::Deploy => write!(f, "deploy"),
            FailOn::Findings => write!(f, "findings"),
            FailOn::Any => write!(f, "any"),
        }
    }
}

/// External executables, overridable for wrappers such as `npx eslint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommands {
    /// PMD launcher.
    pub pmd: String,
    /// ESLint launcher.
    pub eslint: String,
    /// Salesforce CLI.
    pub sf: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            pmd: "pmd".to_string(),
            eslint: "eslint".to_string(),
            sf: "sf".to_string(),
        }
    }
}

/// Immutable configuration shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Branch the pull request targets.
    pub target: String,
    /// Org alias for the validate-only deployment.
    pub alias: Option<String>,
    /// Whether delta generation and deployment validation run.
    pub deploy: bool,
    /// Remove the work directory when the run completes.
    pub discard: bool,
    /// Stream tool output live.
    pub verbose: bool,
    /// Suffixes routing files to analyzers.
    pub filters: ExtensionFilters,
    /// Ruleset handed to PMD.
    pub pmd_ruleset: String,
    /// Apex tests for RunSpecifiedTests; empty uses the org default.
    pub tests: Vec<String>,
    /// Exit-code policy.
    pub fail_on: FailOn,
    /// Globs removed from routing.
    pub exclude: Vec<String>,
    /// Source directory for delta generation.
    pub source_dir: Option<String>,
    /// Minutes to wait for deployment validation.
    pub deploy_wait: u32,
    /// External executables.
    pub tools: ToolCommands,
    /// Extra report destination.
    pub report_path: Option<PathBuf>,
    /// Format of the extra report.
    pub format: OutputFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET_BRANCH.to_string(),
            alias: None,
            deploy: true,
            discard: false,
            verbose: false,
            filters: ExtensionFilters::default(),
            pmd_ruleset: DEFAULT_PMD_RULESET.to_string(),
            tests: Vec::new(),
            fail_on: FailOn::Never,
            exclude: Vec::new(),
            source_dir: None,
            deploy_wait: DEFAULT_DEPLOY_WAIT,
            tools: ToolCommands::default(),
            report_path: None,
            format: OutputFormat::Text,
        }
    }
}

impl RunConfig {
    /// Resolves the configuration from flags and layered defaults.
    pub fn resolve(cli: &Cli, layers: &ConfigLayers) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let pick = |flag: Option<&String>, key: &str| -> Option<String> {
            flag.map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| layers.value(key).map(str::to_string))
        };

        let target = pick(cli.target.as_ref(), KEY_TARGET_BRANCH).unwrap_or(defaults.target);
        let alias = pick(cli.alias.as_ref(), KEY_ORG_ALIAS);

        let filters = ExtensionFilters::new(
            &pick(cli.apex_ext.as_ref(), KEY_APEX_EXT)
                .unwrap_or_else(|| DEFAULT_APEX_EXTENSION.to_string()),
            &pick(cli.js_ext.as_ref(), KEY_JS_EXT)
                .unwrap_or_else(|| DEFAULT_JS_EXTENSION.to_string()),
        );
        if filters.apex == "." || filters.js == "." {
            return Err(ConfigError::InvalidValue {
                key: "extension".to_string(),
                value: ".".to_string(),
                reason: "extension filters cannot be empty".to_string(),
            });
        }

        let pmd_ruleset =
            pick(cli.ruleset.as_ref(), KEY_PMD_RULESET).unwrap_or(defaults.pmd_ruleset);

        let tests = if cli.tests.is_empty() {
            layers.value(KEY_TESTS).map(split_list).unwrap_or_default()
        } else {
            cli.tests
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        };

        let fail_on = match cli.fail_on {
            Some(policy) => policy,
            None => match layers.value(KEY_FAIL_ON) {
                Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: KEY_FAIL_ON.to_string(),
                    value: raw.to_string(),
                    reason: "expected one of never, deploy, findings, any".to_string(),
                })?,
                None => defaults.fail_on,
            },
        };

        let mut exclude = layers.value(KEY_EXCLUDE).map(split_list).unwrap_or_default();
        exclude.extend(cli.exclude.iter().cloned());

        let deploy_wait = match layers.value(KEY_DEPLOY_WAIT) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: KEY_DEPLOY_WAIT.to_string(),
                value: raw.to_string(),
                reason: "expected a whole number of minutes".to_string(),
            })?,
            None => defaults.deploy_wait,
        };

        let tools = ToolCommands {
            pmd: layers
                .value(KEY_PMD_BIN)
                .map_or(defaults.tools.pmd, str::to_string),
            eslint: layers
                .value(KEY_ESLINT_BIN)
                .map_or(defaults.tools.eslint, str::to_string),
            sf: layers
                .value(KEY_SF_BIN)
                .map_or(defaults.tools.sf, str::to_string),
        };

        Ok(Self {
            target,
            alias,
            deploy: !cli.skip_deploy,
            discard: cli.discard,
            verbose: cli.verbose,
            filters,
            pmd_ruleset,
            tests,
            fail_on,
            exclude,
            source_dir: layers.value(KEY_SOURCE_DIR).map(str::to_string),
            deploy_wait,
            tools,
            report_path: cli.report.clone(),
            format: cli.format,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

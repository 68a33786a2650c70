//! CLI interface for pr-validator.

use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use crate::config::{ConfigLayers, FailOn, RunConfig};
use crate::data::OutputFormat;
use crate::git::GitRepository;
use crate::pipeline::Pipeline;
use crate::utils::check_git_repository;

/// pr-validator: static analysis and validate-only deployment for the
/// changes on the current branch.
#[derive(Parser, Debug)]
#[command(name = "pr-validator")]
#[command(
    about = "Validates the changes on the current branch before a pull request",
    long_about = "Computes the files changed since the merge base with the target \
branch, runs PMD on changed Apex classes and ESLint on changed JavaScript, then \
generates an incremental package and runs a validate-only deployment against \
the target org."
)]
#[command(version)]
pub struct Cli {
    /// Branch to compare against (default: main).
    #[arg(long, value_name = "BRANCH")]
    pub target: Option<String>,

    /// Org alias used for the validate-only deployment.
    #[arg(long, value_name = "ORG")]
    pub alias: Option<String>,

    /// Removes the work directory when the run finishes.
    #[arg(long)]
    pub discard: bool,

    /// Streams tool output as it is produced.
    #[arg(long)]
    pub verbose: bool,

    /// Runs the analyzers only; skips delta generation and deployment.
    #[arg(long)]
    pub skip_deploy: bool,

    /// Reads settings from this env file instead of `.pr-validator.env`.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Apex test classes to run during validation (comma-separated).
    #[arg(long, value_name = "TESTS", value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Stage failures that make the process exit with status 2.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub fail_on: Option<FailOn>,

    /// Glob of paths to leave out of analysis; may be repeated.
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Suffix routed to PMD (default: .cls).
    #[arg(long, value_name = "EXT")]
    pub apex_ext: Option<String>,

    /// Suffix routed to ESLint (default: .js).
    #[arg(long, value_name = "EXT")]
    pub js_ext: Option<String>,

    /// PMD ruleset path or reference.
    #[arg(long, value_name = "RULESET")]
    pub ruleset: Option<String>,

    /// Additionally writes the report to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Format of the file written with --report.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Repository to validate.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo: PathBuf,
}

impl Cli {
    /// Runs the validation and returns the process exit code.
    pub fn execute(self) -> Result<i32> {
        let repo = check_git_repository(&self.repo)?;
        let root = repo.workdir()?;

        let layers = ConfigLayers::load(&root, self.env_file.as_deref())?;
        self.execute_with(repo, &layers)
    }

    /// Runs the validation on an opened repository with already loaded layers.
    pub fn execute_with(self, repo: GitRepository, layers: &ConfigLayers) -> Result<i32> {
        let config = RunConfig::resolve(&self, layers)?;
        tracing::debug!("Resolved configuration: {config:?}");

        let outcome = Pipeline::new(config, repo)?.run()?;
        Ok(outcome.exit_code())
    }
}

/// Maps a command-line parse failure to the process exit code.
///
/// Help and version output are not failures.
pub fn usage_exit_code(error: &clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}

//! Sequential validation pipeline.
//!
//! Stages run one after another. A failing tool is recorded in the report and
//! the next stage still runs; only preflight failures abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::config::RunConfig;
use crate::data::{Report, StageKind, StageResult, StageStatus};
use crate::git::{parse_name_status, short_hash, GitRepository, ParsedChanges};
use crate::routing::{build_exclude_set, classify, RoutingResult};
use crate::tools::{eslint, pmd, sf, ToolInvocation};
use crate::utils::preflight::{check_alias, check_stage_tools, check_tool};
use crate::utils::Console;

/// File the Apex list is spilled to for `pmd --file-list`.
pub const APEX_LIST_FILE: &str = "apex-files.txt";
/// File the JavaScript list is spilled to.
pub const JS_LIST_FILE: &str = "js-files.txt";
/// Report written into the work directory.
pub const REPORT_FILE: &str = "report.txt";
/// Directory the delta generator writes into.
pub const DELTA_DIR: &str = "delta";

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The branch has no changes against the target; nothing was analyzed.
    NoChanges,
    /// All stages ran.
    Completed {
        /// Aggregate report.
        report: Box<Report>,
        /// Exit code under the configured policy.
        exit_code: i32,
        /// Work directory, when it was kept.
        work_dir: Option<PathBuf>,
    },
}

impl RunOutcome {
    /// Returns the process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NoChanges => 0,
            RunOutcome::Completed { exit_code, .. } => *exit_code,
        }
    }
}

/// The branch delta, classified.
#[derive(Debug)]
pub struct Delta {
    /// Current branch name.
    pub branch: String,
    /// Merge base of HEAD and the target.
    pub base: String,
    /// Parsed name-status records and warnings.
    pub changes: ParsedChanges,
    /// Files per analyzer after exclusions.
    pub routing: RoutingResult,
}

/// Runs every validation stage for one invocation.
pub struct Pipeline {
    config: RunConfig,
    repo: GitRepository,
    root: PathBuf,
    console: Console,
}

impl Pipeline {
    /// Creates a pipeline for the repository `repo`.
    pub fn new(config: RunConfig, repo: GitRepository) -> Result<Self> {
        let root = repo.workdir()?;
        Ok(Self {
            config,
            repo,
            root,
            console: Console::new(),
        })
    }

    /// Runs preflight checks and all stages.
    pub fn run(&mut self) -> Result<RunOutcome> {
        check_alias(&self.config)?;
        check_tool("git", "computing the branch delta")?;

        let delta = self.compute_delta()?;
        if delta.changes.records.is_empty() {
            self.console.success(&format!(
                "No changes between {} and {}; nothing to validate",
                delta.branch, self.config.target
            ));
            return Ok(RunOutcome::NoChanges);
        }

        check_stage_tools(&self.config, &delta.routing)?;

        let work_dir = tempfile::Builder::new()
            .prefix("pr-validator-")
            .tempdir()
            .context("Failed to create work directory")?;
        tracing::debug!("Work directory: {}", work_dir.path().display());

        let report = self.run_stages(delta, work_dir.path())?;
        self.finish(report, work_dir)
    }

    /// Computes and classifies the changes between the target and HEAD.
    pub fn compute_delta(&mut self) -> Result<Delta> {
        let target = self.repo.resolve_target(&self.config.target)?;
        let base = self.repo.merge_base(target.oid)?;
        let branch = self.repo.current_branch()?;

        self.console.step(&format!(
            "Comparing {branch} against {} (merge base {})",
            target.reference,
            short_hash(&base.to_string())
        ));

        let output = self.repo.name_status_diff(base)?;
        let changes = parse_name_status(&output);
        if !changes.warnings.is_empty() {
            self.console.warn(&format!(
                "Skipped {} malformed change record(s)",
                changes.warnings.len()
            ));
        }

        let mut routing = classify(&changes.records, &self.config.filters);
        routing.exclude(&build_exclude_set(&self.config.exclude)?);

        self.console.plain(&format!(
            "    {} changed file(s): {} Apex, {} JavaScript",
            changes.records.len(),
            routing.apex_files.len(),
            routing.js_files.len()
        ));

        Ok(Delta {
            branch,
            base: base.to_string(),
            changes,
            routing,
        })
    }

    fn run_stages(&mut self, delta: Delta, work_dir: &Path) -> Result<Report> {
        let apex_list = write_file_list(work_dir, APEX_LIST_FILE, &delta.routing.apex_files)?;
        write_file_list(work_dir, JS_LIST_FILE, &delta.routing.js_files)?;

        let mut report = Report::new(
            &delta.branch,
            &self.config.target,
            short_hash(&delta.base),
            delta.routing,
            delta.changes.warnings,
        );

        let stage = if report.routing.apex_files.is_empty() {
            StageResult::skipped("PMD", StageKind::Analyzer, "no Apex files changed")
        } else {
            let invocation =
                pmd::check_invocation(&self.config.tools.pmd, &apex_list, &self.config.pmd_ruleset);
            self.run_stage("PMD", StageKind::Analyzer, &invocation)
        };
        report.push_stage(stage);

        let stage = if report.routing.js_files.is_empty() {
            StageResult::skipped("ESLint", StageKind::Analyzer, "no JavaScript files changed")
        } else {
            let invocation = eslint::lint_invocation(&self.config.tools.eslint, &report.routing.js_files);
            self.run_stage("ESLint", StageKind::Analyzer, &invocation)
        };
        report.push_stage(stage);

        for stage in self.deployment_stages(&delta.base, work_dir) {
            report.push_stage(stage);
        }

        Ok(report)
    }

    fn deployment_stages(&mut self, base: &str, work_dir: &Path) -> Vec<StageResult> {
        const DELTA: &str = "Delta generation";
        const VALIDATE: &str = "Deployment validation";

        let alias = match (&self.config.alias, self.config.deploy) {
            (Some(alias), true) => alias.clone(),
            _ => {
                return vec![
                    StageResult::skipped(DELTA, StageKind::Deployment, "disabled with --skip-deploy"),
                    StageResult::skipped(VALIDATE, StageKind::Deployment, "disabled with --skip-deploy"),
                ];
            }
        };

        let output_dir = work_dir.join(DELTA_DIR);
        let invocation = sf::delta_invocation(
            &self.config.tools.sf,
            base,
            &output_dir,
            self.config.source_dir.as_deref(),
        );
        let delta = self.run_stage(DELTA, StageKind::Deployment, &invocation);

        let manifest = sf::delta_manifest(&output_dir);
        let validate = if delta.status != StageStatus::Passed {
            StageResult::skipped(VALIDATE, StageKind::Deployment, "delta generation failed")
        } else if !manifest.exists() {
            StageResult {
                status: StageStatus::Failed,
                ..StageResult::skipped(
                    VALIDATE,
                    StageKind::Deployment,
                    &format!("delta manifest not found at {}", manifest.display()),
                )
            }
        } else {
            let invocation = sf::validate_invocation(
                &self.config.tools.sf,
                &manifest,
                &alias,
                self.config.deploy_wait,
                &self.config.tests,
            );
            self.run_stage(VALIDATE, StageKind::Deployment, &invocation)
        };

        vec![delta, validate]
    }

    fn run_stage(&mut self, name: &str, kind: StageKind, invocation: &ToolInvocation) -> StageResult {
        self.console.step(name);
        if self.config.verbose {
            self.console.plain(&format!("    $ {}", invocation.display()));
        }

        let result = match invocation.run(&self.root, self.config.verbose) {
            Ok(output) => StageResult::from_output(name, kind, invocation, &output),
            Err(e) => {
                tracing::warn!("{name} could not be run: {e:#}");
                StageResult::spawn_failed(name, kind, invocation, &e)
            }
        };

        match (result.status, result.exit_code) {
            (StageStatus::Passed, _) => self.console.success(&format!("{name} passed")),
            (_, Some(code)) => self
                .console
                .warn(&format!("{name} failed with exit code {code} (see report)")),
            _ => self.console.warn(&format!("{name} failed (see report)")),
        }

        result
    }

    fn finish(&mut self, report: Report, work_dir: TempDir) -> Result<RunOutcome> {
        let report_file = work_dir.path().join(REPORT_FILE);
        report.write_to(&report_file, crate::data::OutputFormat::Text)?;

        if let Some(path) = &self.config.report_path {
            report.write_to(path, self.config.format)?;
            self.console
                .success(&format!("Report written to {}", path.display()));
        }

        self.console.plain("");
        self.console
            .plain(&crate::data::report::format_summary_text(&report.summary));

        let kept = if self.config.discard {
            work_dir
                .close()
                .context("Failed to remove work directory")?;
            None
        } else {
            let path = work_dir.keep();
            self.console
                .plain(&format!("Artifacts kept in {}", path.display()));
            Some(path)
        };

        let exit_code = report.exit_code(self.config.fail_on);
        if exit_code != 0 {
            self.console.error(&format!(
                "Failing run: --fail-on {} matched a failed stage",
                self.config.fail_on
            ));
        }

        Ok(RunOutcome::Completed {
            report: Box::new(report),
            exit_code,
            work_dir: kept,
        })
    }
}

/// Writes one path per line and returns the file's location.
pub fn write_file_list(dir: &Path, name: &str, files: &[String]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut content = files.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(&path, content)
        .with_context(|| format!("Failed to write file list: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn file_list_one_path_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec!["a/One.cls".to_string(), "b/Two.cls".to_string()];
        let path = write_file_list(dir.path(), APEX_LIST_FILE, &files).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a/One.cls\nb/Two.cls\n");
    }

    #[test]
    fn empty_file_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file_list(dir.path(), JS_LIST_FILE, &[]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn no_changes_exits_zero() {
        assert_eq!(RunOutcome::NoChanges.exit_code(), 0);
    }
}

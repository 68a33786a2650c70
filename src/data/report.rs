//! Aggregate validation report.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::FailOn;
use crate::git::ParseWarning;
use crate::routing::RoutingResult;
use crate::tools::{ToolInvocation, ToolOutput};

/// Exit code used when the `--fail-on` policy is triggered.
pub const GATED_EXIT_CODE: i32 = 2;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// What a stage checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Static analysis; failures are findings.
    Analyzer,
    /// Delta generation or validate-only deployment.
    Deployment,
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Tool exited with status 0.
    Passed,
    /// Tool exited non-zero or could not be run.
    Failed,
    /// Stage did not run.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Passed => write!(f, "passed"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Display name.
    pub name: String,
    /// Stage category.
    pub kind: StageKind,
    /// Outcome.
    pub status: StageStatus,
    /// Exit code of the tool, when it ran to completion.
    pub exit_code: Option<i32>,
    /// Command line that was executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Captured output, or the reason the stage did not run.
    pub output: String,
}

impl StageResult {
    /// Builds a result from a finished tool.
    pub fn from_output(
        name: &str,
        kind: StageKind,
        invocation: &ToolInvocation,
        output: &ToolOutput,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: if output.success() {
                StageStatus::Passed
            } else {
                StageStatus::Failed
            },
            exit_code: output.exit_code,
            command: Some(invocation.display()),
            output: output.combined(),
        }
    }

    /// Builds a failed result for a tool that could not be spawned.
    pub fn spawn_failed(
        name: &str,
        kind: StageKind,
        invocation: &ToolInvocation,
        error: &anyhow::Error,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: StageStatus::Failed,
            exit_code: None,
            command: Some(invocation.display()),
            output: format!("{error:#}"),
        }
    }

    /// Builds a skipped result.
    pub fn skipped(name: &str, kind: StageKind, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: StageStatus::Skipped,
            exit_code: None,
            command: None,
            output: reason.to_string(),
        }
    }

    /// Returns true when the stage failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// Summary statistics for a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Apex files routed to PMD.
    pub apex_files: usize,
    /// JavaScript files routed to ESLint.
    pub js_files: usize,
    /// Skipped malformed change records.
    pub parse_warnings: usize,
    /// Stages that passed.
    pub passed: usize,
    /// Stages that failed.
    pub failed: usize,
    /// Stages that were skipped.
    pub skipped: usize,
}

/// Complete report of one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Version of this tool.
    pub tool_version: String,
    /// When the run started.
    pub generated_at: DateTime<Utc>,
    /// Branch being validated.
    pub branch: String,
    /// Target branch as configured.
    pub target: String,
    /// Merge base the delta was computed from.
    pub base: String,
    /// Files routed to each analyzer.
    pub routing: RoutingResult,
    /// Skipped malformed change records.
    pub parse_warnings: Vec<ParseWarning>,
    /// Stage outcomes in execution order.
    pub stages: Vec<StageResult>,
    /// Summary statistics.
    pub summary: ReportSummary,
}

impl Report {
    /// Creates a report with no stages yet.
    pub fn new(
        branch: &str,
        target: &str,
        base: &str,
        routing: RoutingResult,
        parse_warnings: Vec<ParseWarning>,
    ) -> Self {
        let mut report = Self {
            tool_version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            branch: branch.to_string(),
            target: target.to_string(),
            base: base.to_string(),
            routing,
            parse_warnings,
            stages: Vec::new(),
            summary: ReportSummary::default(),
        };
        report.refresh_summary();
        report
    }

    /// Appends a stage outcome regardless of its status.
    pub fn push_stage(&mut self, stage: StageResult) {
        self.stages.push(stage);
        self.refresh_summary();
    }

    fn refresh_summary(&mut self) {
        let count = |status| self.stages.iter().filter(|s| s.status == status).count();
        self.summary = ReportSummary {
            apex_files: self.routing.apex_files.len(),
            js_files: self.routing.js_files.len(),
            parse_warnings: self.parse_warnings.len(),
            passed: count(StageStatus::Passed),
            failed: count(StageStatus::Failed),
            skipped: count(StageStatus::Skipped),
        };
    }

    /// Returns the process exit code under `policy`.
    #[must_use]
    pub fn exit_code(&self, policy: FailOn) -> i32 {
        let failed = |kind: Option<StageKind>| {
            self.stages
                .iter()
                .any(|s| s.failed() && kind.map_or(true, |k| s.kind == k))
        };

        let gated = match policy {
            FailOn::Never => false,
            FailOn::Deploy => failed(Some(StageKind::Deployment)),
            FailOn::Findings => failed(Some(StageKind::Analyzer)),
            FailOn::Any => failed(None),
        };

        if gated {
            GATED_EXIT_CODE
        } else {
            0
        }
    }

    /// Renders the report in `format`.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Yaml => super::yaml::to_yaml(self),
            OutputFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
            }
        }
    }

    /// Writes the rendered report to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path, format: OutputFormat) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let content = self.render(format)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }

    /// Renders the human-readable report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str("PR validation report\n");
        out.push_str(&format!(
            "Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!(
            "Branch:    {} -> {} (base {})\n",
            self.branch, self.target, self.base
        ));
        out.push_str(&format!("Tool:      pr-validator {}\n", self.tool_version));

        out.push_str("\nChanged files\n");
        push_file_list(&mut out, "Apex", &self.routing.apex_files);
        push_file_list(&mut out, "JavaScript", &self.routing.js_files);

        if !self.parse_warnings.is_empty() {
            out.push_str(&format!(
                "\nSkipped change records ({})\n",
                self.parse_warnings.len()
            ));
            for warning in &self.parse_warnings {
                out.push_str(&format!(
                    "  line {}: {:?} ({})\n",
                    warning.line_number, warning.line, warning.reason
                ));
            }
        }

        for stage in &self.stages {
            out.push('\n');
            out.push_str(&format_stage_header(stage));
            out.push('\n');
            if let Some(command) = &stage.command {
                out.push_str(&format!("$ {command}\n"));
            }
            let output = stage.output.trim_end();
            if !output.is_empty() {
                out.push_str(output);
                out.push('\n');
            }
        }

        out.push('\n');
        out.push_str(&format_summary_text(&self.summary));
        out.push('\n');
        out
    }
}

fn push_file_list(out: &mut String, label: &str, files: &[String]) {
    out.push_str(&format!("  {label} ({}):\n", files.len()));
    for file in files {
        out.push_str(&format!("    {file}\n"));
    }
}

/// Formats a stage heading such as `== PMD [failed, exit 4] ==`.
fn format_stage_header(stage: &StageResult) -> String {
    match stage.exit_code {
        Some(code) if stage.status != StageStatus::Skipped => {
            format!("== {} [{}, exit {code}] ==", stage.name, stage.status)
        }
        _ => format!("== {} [{}] ==", stage.name, stage.status),
    }
}

/// Formats the summary section of a report.
pub fn format_summary_text(summary: &ReportSummary) -> String {
    format!(
        "{RULE}\n\
         Summary: {} apex file(s), {} js file(s), {} skipped record(s)\n\
         \x20 {} passed, {} failed, {} skipped",
        summary.apex_files,
        summary.js_files,
        summary.parse_warnings,
        summary.passed,
        summary.failed,
        summary.skipped,
    )
}

/// Output format for the persisted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// YAML format.
    Yaml,
    /// JSON format.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_report() -> Report {
        let routing = RoutingResult {
            apex_files: vec![
                "force-app/classes/Foo.cls".to_string(),
                "new/Baz.cls".to_string(),
            ],
            js_files: vec!["force-app/lwc/widget/widget.js".to_string()],
        };
        let warnings = vec![ParseWarning {
            line_number: 3,
            line: "R100\tlonely.cls".to_string(),
            reason: "status R100 expects 2 path(s), found 1".to_string(),
        }];

        let mut report = Report::new("feature/widget", "main", "abc12345", routing, warnings);
        report.tool_version = "0.1.0".to_string();
        report.generated_at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();

        let pmd = ToolInvocation::from_command("pmd").arg("check");
        report.push_stage(StageResult::from_output(
            "PMD",
            StageKind::Analyzer,
            &pmd,
            &ToolOutput {
                exit_code: Some(4),
                stdout: "Foo.cls:3: ApexDoc: Missing ApexDoc comment\n".to_string(),
                stderr: String::new(),
            },
        ));
        let eslint = ToolInvocation::from_command("eslint").arg("widget.js");
        report.push_stage(StageResult::from_output(
            "ESLint",
            StageKind::Analyzer,
            &eslint,
            &ToolOutput {
                exit_code: Some(0),
                ..Default::default()
            },
        ));
        report.push_stage(StageResult::skipped(
            "Deployment validation",
            StageKind::Deployment,
            "disabled with --skip-deploy",
        ));
        report
    }

    #[test]
    fn summary_counts() {
        let report = sample_report();
        assert_eq!(
            report.summary,
            ReportSummary {
                apex_files: 2,
                js_files: 1,
                parse_warnings: 1,
                passed: 1,
                failed: 1,
                skipped: 1,
            }
        );
    }

    #[test]
    fn text_report_snapshot() {
        insta::assert_snapshot!(sample_report().render_text(), @r#"
        PR validation report
        Generated: 2026-10-16 09:30:00 UTC
        Branch:    feature/widget -> main (base abc12345)
        Tool:      pr-validator 0.1.0

        Changed files
          Apex (2):
            force-app/classes/Foo.cls
            new/Baz.cls
          JavaScript (1):
            force-app/lwc/widget/widget.js

        Skipped change records (1)
          line 3: "R100\tlonely.cls" (status R100 expects 2 path(s), found 1)

        == PMD [failed, exit 4] ==
        $ pmd check
        Foo.cls:3: ApexDoc: Missing ApexDoc comment

        == ESLint [passed, exit 0] ==
        $ eslint widget.js

        == Deployment validation [skipped] ==
        disabled with --skip-deploy

        ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        Summary: 2 apex file(s), 1 js file(s), 1 skipped record(s)
          1 passed, 1 failed, 1 skipped
        "#);
    }

    #[test]
    fn exit_code_policies() {
        let mut report = sample_report();
        assert_eq!(report.exit_code(FailOn::Never), 0);
        assert_eq!(report.exit_code(FailOn::Findings), GATED_EXIT_CODE);
        assert_eq!(report.exit_code(FailOn::Any), GATED_EXIT_CODE);
        // Skipped deployment is not a failure.
        assert_eq!(report.exit_code(FailOn::Deploy), 0);

        report.stages.retain(|s| s.kind == StageKind::Deployment);
        report.push_stage(StageResult {
            name: "Deployment validation".to_string(),
            kind: StageKind::Deployment,
            status: StageStatus::Failed,
            exit_code: Some(1),
            command: None,
            output: "Component failures".to_string(),
        });
        assert_eq!(report.exit_code(FailOn::Deploy), GATED_EXIT_CODE);
        assert_eq!(report.exit_code(FailOn::Findings), 0);
    }

    #[test]
    fn spawn_failure_is_a_failed_stage() {
        let invocation = ToolInvocation::from_command("pmd");
        let stage = StageResult::spawn_failed(
            "PMD",
            StageKind::Analyzer,
            &invocation,
            &anyhow::anyhow!("No such file or directory"),
        );
        assert!(stage.failed());
        assert_eq!(stage.exit_code, None);
    }

    #[test]
    fn json_round_trip_keeps_stages() {
        let report = sample_report();
        let json = report.render(OutputFormat::Json).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.stages, report.stages);
        assert_eq!(parsed.summary, report.summary);
    }

    #[test]
    fn yaml_contains_summary() {
        let yaml = sample_report().render(OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("summary:"));
        assert!(yaml.contains("status: failed"));
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("pr.txt");
        sample_report().write_to(&path, OutputFormat::Text).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("PR validation report"));
    }
}

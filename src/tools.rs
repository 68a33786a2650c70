//! External tool invocation.
//!
//! Every tool runs to completion before the next stage starts. A non-zero
//! exit status is an outcome, not an error; only a failure to spawn the
//! process is reported as `Err`.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};

pub mod eslint;
pub mod pmd;
pub mod sf;

/// A fully built command line for an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Executable to spawn.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Starts an invocation from a configured command such as `pmd` or `npx eslint`.
    pub fn from_command(command: &str) -> Self {
        let (program, args) = split_command(command);
        Self {
            program: program.to_string(),
            args: args.into_iter().map(str::to_string).collect(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the command line for logs and reports.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the tool in `cwd`, capturing stdout and stderr.
    ///
    /// With `echo` set, each output line is also printed as it arrives.
    pub fn run(&self, cwd: &Path, echo: bool) -> Result<ToolOutput> {
        tracing::info!("Running {}", self.display());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        let stdout = child
            .stdout
            .take()
            .context("Child process has no stdout pipe")?;
        let stderr = child
            .stderr
            .take()
            .context("Child process has no stderr pipe")?;

        // Drain stderr on its own thread so a full pipe cannot block the child.
        let stderr_reader = thread::spawn(move || collect_lines(stderr, echo, true));
        let stdout_text = collect_lines(stdout, echo, false);
        let stderr_text = stderr_reader.join().unwrap_or_default();

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {}", self.program))?;

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: stdout_text,
            stderr: stderr_text,
        })
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Returns true when the tool exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

fn collect_lines<R: Read>(reader: R, echo: bool, to_stderr: bool) -> String {
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();

    // Drain to EOF regardless of encoding; invalid bytes become U+FFFD.
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Stopped reading tool output: {e}");
                break;
            }
        }

        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches('\n').trim_end_matches('\r');
        if echo {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
        collected.push_str(line);
        collected.push('\n');
    }
    collected
}

/// Splits a command string into the executable and its arguments.
///
/// Handles tools configured with a launcher, e.g. `"npx eslint"` becomes
/// `("npx", vec!["eslint"])`.
pub fn split_command(command: &str) -> (&str, Vec<&str>) {
    let mut parts = command.split_whitespace();
    let program = parts.next().unwrap_or(command);
    (program, parts.collect())
}

//! Colored progress output for the terminal.

use std::io::{self, IsTerminal, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Kind of progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// A stage is starting.
    Step,
    /// Something finished successfully.
    Success,
    /// Something failed but the run continues.
    Warning,
    /// The run is about to stop.
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Step => "==>",
            Level::Success => " ok",
            Level::Warning => "warn",
            Level::Error => "error",
        }
    }

    fn color(self) -> Color {
        match self {
            Level::Step => Color::Cyan,
            Level::Success => Color::Green,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

/// Writes progress lines to stdout, colored when stdout is a terminal.
pub struct Console {
    stream: StandardStream,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Creates a console honoring `NO_COLOR` and terminal detection.
    pub fn new() -> Self {
        Self {
            stream: StandardStream::stdout(color_choice(
                io::stdout().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            )),
        }
    }

    /// Prints a stage heading.
    pub fn step(&mut self, message: &str) {
        self.line(Level::Step, message);
    }

    /// Prints a success line.
    pub fn success(&mut self, message: &str) {
        self.line(Level::Success, message);
    }

    /// Prints a warning line.
    pub fn warn(&mut self, message: &str) {
        self.line(Level::Warning, message);
    }

    /// Prints an error line.
    pub fn error(&mut self, message: &str) {
        self.line(Level::Error, message);
    }

    /// Prints plain text without a label.
    pub fn plain(&mut self, message: &str) {
        let _ = writeln!(self.stream, "{message}");
    }

    fn line(&mut self, level: Level, message: &str) {
        // Progress output is best effort; a closed stdout must not abort the run.
        let _ = self.write_line(level, message);
    }

    fn write_line(&mut self, level: Level, message: &str) -> io::Result<()> {
        self.stream
            .set_color(ColorSpec::new().set_fg(Some(level.color())).set_bold(true))?;
        write!(self.stream, "{}", level.label())?;
        self.stream.reset()?;
        writeln!(self.stream, " {message}")
    }
}

fn color_choice(is_terminal: bool, no_color: bool) -> ColorChoice {
    if is_terminal && !no_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

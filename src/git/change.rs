//! Name-status change records.
//!
//! Parses the output of `git diff --name-status`, where every line is either
//! `<status>\t<path>` or `<status>\t<old path>\t<new path>`. Paths that git
//! C-quotes (those containing `"`, `\\` or control characters) are decoded.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status token: one uppercase letter plus an optional similarity score (`R095`, `C100`).
#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<letter>[A-Z])(?P<score>\d{1,3})?$").unwrap());

/// Git change status of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    /// File added on the branch.
    Added,
    /// File content modified.
    Modified,
    /// File removed; never routed to an analyzer.
    Deleted,
    /// File renamed, with git's similarity percentage when reported.
    Renamed(Option<u8>),
    /// File copied, with git's similarity percentage when reported.
    Copied(Option<u8>),
    /// Any other letter git may emit (`T`, `U`, `X`, ...).
    Unknown(char),
}

impl StatusCode {
    /// Returns true for statuses that carry an old and a new path.
    #[must_use]
    pub fn has_two_paths(self) -> bool {
        matches!(self, StatusCode::Renamed(_) | StatusCode::Copied(_))
    }

    /// Returns the leading status letter.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            StatusCode::Added => 'A',
            StatusCode::Modified => 'M',
            StatusCode::Deleted => 'D',
            StatusCode::Renamed(_) => 'R',
            StatusCode::Copied(_) => 'C',
            StatusCode::Unknown(c) => c,
        }
    }
}

impl std::str::FromStr for StatusCode {
    type Err = ChangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = STATUS_PATTERN
            .captures(s)
            .ok_or_else(|| ChangeParseError::InvalidStatus(s.to_string()))?;

        // Only the leading letter is significant; the score is informational.
        let letter = caps["letter"].chars().next().unwrap_or('?');
        let score = caps
            .name("score")
            .and_then(|m| m.as_str().parse::<u8>().ok());

        Ok(match letter {
            'A' => StatusCode::Added,
            'M' => StatusCode::Modified,
            'D' => StatusCode::Deleted,
            'R' => StatusCode::Renamed(score),
            'C' => StatusCode::Copied(score),
            other => StatusCode::Unknown(other),
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Renamed(Some(score)) | StatusCode::Copied(Some(score)) => {
                write!(f, "{}{score:03}", self.letter())
            }
            _ => write!(f, "{}", self.letter()),
        }
    }
}

/// Reasons a name-status line cannot become a [`ChangeRecord`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeParseError {
    /// The status token is not a letter with an optional score.
    #[error("invalid status token {0:?}")]
    InvalidStatus(String),

    /// The line has no path after the status.
    #[error("missing path")]
    MissingPath,

    /// A path field is present but empty.
    #[error("empty path")]
    EmptyPath,

    /// A quoted path contains an escape sequence git never produces.
    #[error("invalid quoted path {0}")]
    InvalidQuoting(String),

    /// The number of paths does not match the status.
    #[error("status {status} expects {expected} path(s), found {found}")]
    PathCount {
        /// Status the line carried.
        status: String,
        /// Paths required by that status.
        expected: usize,
        /// Paths actually present.
        found: usize,
    },
}

/// One line of name-status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    status: StatusCode,
    paths: Vec<String>,
}

impl ChangeRecord {
    /// Builds a record, enforcing two paths for renames/copies and one otherwise.
    pub fn new(status: StatusCode, paths: Vec<String>) -> Result<Self, ChangeParseError> {
        if paths.is_empty() {
            return Err(ChangeParseError::MissingPath);
        }
        if paths.iter().any(|p| p.is_empty()) {
            return Err(ChangeParseError::EmptyPath);
        }

        let expected = if status.has_two_paths() { 2 } else { 1 };
        if paths.len() != expected {
            return Err(ChangeParseError::PathCount {
                status: status.to_string(),
                expected,
                found: paths.len(),
            });
        }

        Ok(Self { status, paths })
    }

    /// Parses a single `<status>\t<path>[\t<path>]` line.
    pub fn parse_line(line: &str) -> Result<Self, ChangeParseError> {
        let mut fields = line.split('\t');
        let status: StatusCode = fields.next().unwrap_or_default().trim().parse()?;
        let paths = fields
            .map(unquote_path)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(status, paths)
    }

    /// Returns the record's status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the record's paths (old then new for renames/copies).
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Returns the path that exists after the change, or `None` for deletions.
    #[must_use]
    pub fn effective_path(&self) -> Option<&str> {
        match self.status {
            StatusCode::Deleted => None,
            // Copies follow the rename rule: the new path is the one to analyze.
            StatusCode::Renamed(_) | StatusCode::Copied(_) => self.paths.get(1).map(String::as_str),
            _ => self.paths.first().map(String::as_str),
        }
    }
}

/// Decodes a path field git wrapped in double quotes.
///
/// Unquoted fields are returned unchanged. Octal escapes are raw bytes, so
/// `"caf\303\251.cls"` decodes to `café.cls`.
fn unquote_path(field: &str) -> Result<String, ChangeParseError> {
    let Some(inner) = field
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return Ok(field.to_string());
    };

    let invalid = || ChangeParseError::InvalidQuoting(field.to_string());
    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes();

    while let Some(byte) = iter.next() {
        match byte {
            b'\\' => {}
            b'"' => return Err(invalid()),
            _ => {
                bytes.push(byte);
                continue;
            }
        }

        let decoded = match iter.next().ok_or_else(invalid)? {
            b'"' => b'"',
            b'\\' => b'\\',
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            high @ b'0'..=b'3' => {
                let mid = octal_digit(iter.next()).ok_or_else(invalid)?;
                let low = octal_digit(iter.next()).ok_or_else(invalid)?;
                ((high - b'0') << 6) | (mid << 3) | low
            }
            _ => return Err(invalid()),
        };
        bytes.push(decoded);
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn octal_digit(byte: Option<u8>) -> Option<u8> {
    byte.filter(|b| (b'0'..=b'7').contains(b))
        .map(|b| b - b'0')
}

/// A line skipped while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based line number in the diff output.
    pub line_number: usize,
    /// The raw line.
    pub line: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Records and warnings produced from one diff output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChanges {
    /// Well-formed records, in input order.
    pub records: Vec<ChangeRecord>,
    /// Malformed lines that were skipped.
    pub warnings: Vec<ParseWarning>,
}

/// Parses complete `git diff --name-status` output.
///
/// Blank lines are ignored. Malformed lines never abort parsing; they are
/// returned as [`ParseWarning`]s instead.
pub fn parse_name_status(output: &str) -> ParsedChanges {
    let mut parsed = ParsedChanges::default();

    for (index, line) in output.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        match ChangeRecord::parse_line(line) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                tracing::warn!("Skipping malformed change record {line:?}: {e}");
                parsed.warnings.push(ParseWarning {
                    line_number: index + 1,
                    line: line.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    parsed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_letters() {
        assert_eq!("A".parse::<StatusCode>().unwrap(), StatusCode::Added);
        assert_eq!("M".parse::<StatusCode>().unwrap(), StatusCode::Modified);
        assert_eq!("D".parse::<StatusCode>().unwrap(), StatusCode::Deleted);
        assert_eq!("T".parse::<StatusCode>().unwrap(), StatusCode::Unknown('T'));
    }

    #[test]
    fn status_with_similarity_score() {
        assert_eq!(
            "R100".parse::<StatusCode>().unwrap(),
            StatusCode::Renamed(Some(100))
        );
        assert_eq!(
            "C080".parse::<StatusCode>().unwrap(),
            StatusCode::Copied(Some(80))
        );
        assert_eq!("R".parse::<StatusCode>().unwrap(), StatusCode::Renamed(None));
    }

    #[test]
    fn status_rejects_garbage() {
        assert!("".parse::<StatusCode>().is_err());
        assert!("modified".parse::<StatusCode>().is_err());
        assert!("r100".parse::<StatusCode>().is_err());
    }

    #[test]
    fn status_display_keeps_score() {
        assert_eq!(StatusCode::Renamed(Some(95)).to_string(), "R095");
        assert_eq!(StatusCode::Modified.to_string(), "M");
    }

    #[test]
    fn rename_line_has_two_paths() {
        let record = ChangeRecord::parse_line("R095\told/Baz.cls\tnew/Baz.cls").unwrap();
        assert_eq!(record.status(), StatusCode::Renamed(Some(95)));
        assert_eq!(record.paths(), ["old/Baz.cls", "new/Baz.cls"]);
        assert_eq!(record.effective_path(), Some("new/Baz.cls"));
    }

    #[test]
    fn copy_uses_new_path() {
        let record = ChangeRecord::parse_line("C080\ta.cls\tb.cls").unwrap();
        assert_eq!(record.effective_path(), Some("b.cls"));
    }

    #[test]
    fn deleted_has_no_effective_path() {
        let record = ChangeRecord::parse_line("D\tforce-app/classes/Bar.cls").unwrap();
        assert_eq!(record.effective_path(), None);
    }

    #[test]
    fn unknown_status_is_plain_modification() {
        let record = ChangeRecord::parse_line("T\tscripts/run.js").unwrap();
        assert_eq!(record.effective_path(), Some("scripts/run.js"));
    }

    #[test]
    fn rename_with_one_path_is_malformed() {
        let err = ChangeRecord::parse_line("R100\tonly.cls").unwrap_err();
        assert_eq!(
            err,
            ChangeParseError::PathCount {
                status: "R100".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn missing_and_empty_paths_are_malformed() {
        assert_eq!(
            ChangeRecord::parse_line("M").unwrap_err(),
            ChangeParseError::MissingPath
        );
        assert_eq!(
            ChangeRecord::parse_line("X\t").unwrap_err(),
            ChangeParseError::EmptyPath
        );
    }

    #[test]
    fn parse_collects_warnings_and_keeps_going() {
        let output = "M\tforce-app/classes/Foo.cls\n\
                      garbage line\n\
                      \n\
                      A\tforce-app/lwc/widget/widget.js\n";
        let parsed = parse_name_status(output);

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line_number, 2);
        assert_eq!(parsed.warnings[0].line, "garbage line");
    }

    #[test]
    fn parse_handles_crlf() {
        let parsed = parse_name_status("M\tFoo.cls\r\nA\tbar.js\r\n");
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.records[0].paths(), ["Foo.cls"]);
        assert_eq!(parsed.records[1].paths(), ["bar.js"]);
    }

    #[test]
    fn quoted_paths_are_decoded() {
        let record = ChangeRecord::parse_line("A\t\"Say\\\"Hi\\\".cls\"").unwrap();
        assert_eq!(record.effective_path(), Some(r#"Say"Hi".cls"#));

        let record = ChangeRecord::parse_line("A\t\"tab\\there.js\"").unwrap();
        assert_eq!(record.effective_path(), Some("tab\there.js"));

        let record = ChangeRecord::parse_line("M\t\"back\\\\slash.cls\"").unwrap();
        assert_eq!(record.effective_path(), Some(r"back\slash.cls"));
    }

    #[test]
    fn quoted_octal_escapes_are_bytes() {
        let record = ChangeRecord::parse_line("A\t\"classes/caf\\303\\251.cls\"").unwrap();
        assert_eq!(record.effective_path(), Some("classes/café.cls"));
    }

    #[test]
    fn quoted_rename_decodes_both_paths() {
        let record =
            ChangeRecord::parse_line("R100\t\"old\\\"name.cls\"\t\"new\\\"name.cls\"").unwrap();
        assert_eq!(record.paths(), [r#"old"name.cls"#, r#"new"name.cls"#]);
    }

    #[test]
    fn bad_quoting_is_a_warning() {
        let parsed = parse_name_status("A\t\"bad\\q.cls\"\nM\tFoo.cls\n");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].reason.contains("invalid quoted path"));
    }

    #[test]
    fn plain_paths_with_quotes_inside_pass_through() {
        let record = ChangeRecord::parse_line("A\tsrc/it's.js").unwrap();
        assert_eq!(record.effective_path(), Some("src/it's.js"));
    }

    #[test]
    fn parse_empty_output() {
        assert_eq!(parse_name_status(""), ParsedChanges::default());
    }
}

//! Report data structures and serialization.

pub mod report;
pub mod yaml;

pub use report::{OutputFormat, Report, ReportSummary, StageKind, StageResult, StageStatus};

//! # pr-validator
//!
//! Pre-merge validation for Salesforce projects kept in git.
//!
//! The changes between the current branch and its target are read as git
//! name-status records, routed by file suffix to PMD (Apex) and ESLint
//! (JavaScript), and optionally packaged into an incremental delta that is
//! validated against an org without being deployed. All outcomes are
//! collected into a single report.
//!
//! ## Quick Start
//!
//! ```rust
//! use pr_validator::git::parse_name_status;
//! use pr_validator::routing::{classify, ExtensionFilters};
//!
//! let parsed = parse_name_status("M\tsrc/Foo.cls\nD\tsrc/Old.cls\nA\tlwc/app.js\n");
//! let routing = classify(&parsed.records, &ExtensionFilters::default());
//! assert_eq!(routing.apex_files, vec!["src/Foo.cls"]);
//! assert_eq!(routing.js_files, vec!["lwc/app.js"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod data;
pub mod git;
pub mod pipeline;
pub mod routing;
pub mod tools;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of pr-validator.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

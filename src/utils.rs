//! Utility functions and helpers.

pub mod console;
pub mod preflight;
pub mod settings;

pub use console::Console;
pub use preflight::{
    check_alias, check_git_repository, check_stage_tools, check_tool, PreflightError,
};
pub use settings::Settings;

//! Command-line interface for rawforge.
//!
//! Provides the recipe run plus the validation, design-check and summary
//! reports.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

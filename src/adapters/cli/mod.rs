//! CLI Adapter
//!
//! Command-line interface for capwatch.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CheckConfigCmd, CliApp, Command, RunCmd, StatusCmd};

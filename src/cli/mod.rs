//! CLI module for the file monitor.
//!
//! Provides command-line interface parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, PatternSpec, WatchArgs};

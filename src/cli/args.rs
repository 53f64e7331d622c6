//! CLI argument parsing using clap.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::monitor::BackendKind;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// File change monitor
#[derive(Parser)]
#[command(
    name = "filemonitor",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch files and directories for changes",
    long_about = "Watch individual files, or directory trees filtered by a regular expression, and print every change.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Watch files and directory trees, printing one line per event
    #[command(
        about = "Watch files and print change events",
        after_help = "Examples:\n  filemonitor watch notes.txt\n  filemonitor watch --pattern ~/photos='.*\\.jpg'\n  filemonitor watch todo.md --backend polling --json --timeout-secs 30\n\nPatterns are matched against the path relative to ROOT, anchored at both ends."
    )]
    Watch(WatchArgs),

    /// Initialize project
    #[command(about = "Set up .filemonitor directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .filemonitor/settings.toml")]
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Regular files to watch
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory tree filtered by a regular expression
    #[arg(short, long = "pattern", value_name = "ROOT=REGEX", value_parser = parse_pattern_spec)]
    pub patterns: Vec<PatternSpec>,

    /// Event source (overrides config)
    #[arg(short, long)]
    pub backend: Option<BackendKind>,

    /// Polling backend rescan interval (overrides config)
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Stop after this many seconds instead of running until interrupted
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

/// A `ROOT=REGEX` pair from `--pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub root: PathBuf,
    pub regex: String,
}

fn parse_pattern_spec(value: &str) -> Result<PatternSpec, String> {
    let (root, regex) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ROOT=REGEX, got '{value}'"))?;

    if root.is_empty() {
        return Err("pattern root must not be empty".to_string());
    }
    if regex.is_empty() {
        return Err("pattern must not be empty".to_string());
    }

    Ok(PatternSpec {
        root: PathBuf::from(root),
        regex: regex.to_string(),
    })
}

//! CLI argument definitions for the consultation application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use consult_core::config::ResolverKind;

/// consult: a scripted symptom interview with automated triage.
#[derive(Parser, Debug)]
#[command(name = "consult", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the consultation database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run an interactive consultation on the terminal.
    Run {
        /// User the consultation is recorded for.
        #[arg(short = 'u', long = "user")]
        user: String,

        /// Override the configured diagnosis resolver.
        #[arg(long = "resolver", value_enum)]
        resolver: Option<ResolverArg>,
    },

    /// Show a user's past consultations, newest first.
    History {
        #[arg(short = 'u', long = "user")]
        user: String,

        /// Maximum number of consultations to show.
        #[arg(short = 'n', long = "limit")]
        limit: Option<u64>,

        /// Print JSON documents instead of a table.
        #[arg(long = "json")]
        json: bool,
    },

    /// Print the canonical symptom vocabulary.
    Vocabulary,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolverArg {
    Llm,
    Catalog,
}

impl From<ResolverArg> for ResolverKind {
    fn from(arg: ResolverArg) -> Self {
        match arg {
            ResolverArg::Llm => ResolverKind::Llm,
            ResolverArg::Catalog => ResolverKind::Catalog,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONSULT_CONFIG env var > ~/.consult/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CONSULT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory: --data-dir flag, else the config value,
    /// with `~` expanded.
    pub fn resolve_data_dir(&self, config_data_dir: &str) -> PathBuf {
        match self.data_dir {
            Some(ref p) => p.clone(),
            None => expand_home(config_data_dir),
        }
    }

    /// The --log-level override, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".consult").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest)
    } else {
        PathBuf::from(path)
    }
}

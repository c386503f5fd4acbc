//! Runtime configuration resolved from environment variables.

use std::path::PathBuf;

const HISTORY_FILE: &str = ".replit_history";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Process-level settings for the CLI and REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `tracing` filter directive, e.g. `replit::vm=trace`.
    pub log_filter: String,
    /// Print each chunk's disassembly to stderr before running it.
    pub disassemble: bool,
    /// Colored diagnostics.
    pub color: bool,
    /// Where the REPL keeps its history.
    pub history_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            disassemble: false,
            color: true,
            history_path: default_history_path(),
        }
    }
}

impl Config {
    /// Read `REPLIT_LOG`, `REPLIT_DISASSEMBLE`, `NO_COLOR` and `REPLIT_HISTORY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_filter = lookup("REPLIT_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        let disassemble = lookup("REPLIT_DISASSEMBLE")
            .map(|v| is_truthy(&v))
            .unwrap_or(defaults.disassemble);

        // Any value disables color, even an empty one.
        let color = lookup("NO_COLOR").is_none();

        let history_path = lookup("REPLIT_HISTORY")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.history_path);

        Self {
            log_filter,
            disassemble,
            color,
            history_path,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_history_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}

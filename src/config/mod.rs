//! Configuration management for zentao-notify.
//!
//! Configuration is resolved once at startup from environment variables,
//! optionally seeded from a `.env` file, into an explicit [`Config`] that is
//! passed to the client and the poller. Nothing else reads the environment.

mod profile;
mod settings;

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub use profile::ZentaoProfile;
pub use settings::Settings;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform data directory to place the state file in.
    #[error("Could not determine local data directory")]
    NoDataDir,

    /// A configuration file could not be read.
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] io::Error),

    /// A configuration value is missing or invalid.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// The fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// ZenTao connection settings.
    pub zentao: ZentaoProfile,
    /// Notification and polling settings.
    pub settings: Settings,
}

impl Config {
    /// Load `.env` from the working directory, then resolve from the
    /// process environment.
    pub fn from_env() -> Result<Self> {
        load_dotenv(Path::new(".env"))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            zentao: ZentaoProfile::from_lookup(&lookup),
            settings: Settings::from_lookup(&lookup)?,
        })
    }
}

/// Export `KEY=VALUE` lines from a dotenv file into the environment.
///
/// Blank lines and `#` comments are ignored, surrounding quotes are
/// stripped, and variables that are already set are left untouched. A
/// missing file is not an error.
pub fn load_dotenv(path: &Path) -> Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var_os(&key).is_none() {
            debug!(key = %key, "Loaded variable from .env");
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

/// Parse dotenv content into key/value pairs, skipping empty values.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = unquote(value.trim());
            (!key.is_empty() && !value.is_empty())
                .then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Read a trimmed, non-empty variable.
pub(crate) fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

//! Notification and polling settings.

use std::path::PathBuf;

use super::{non_empty, ConfigError, Result};

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Shortest polling interval the daemon accepts.
pub const MIN_POLL_INTERVAL_SECS: u64 = 60;

/// Notification and polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// The Feishu custom bot webhook.
    pub webhook_url: Option<String>,
    /// Seconds between polling cycles in daemon mode.
    pub poll_interval_secs: u64,
    /// Where the last check time is persisted.
    pub state_file: PathBuf,
}

impl Settings {
    /// Read settings from `FEISHU_WEBHOOK_URL`, `POLL_INTERVAL` and
    /// `STATE_FILE`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval_secs = match non_empty(lookup, "POLL_INTERVAL") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "POLL_INTERVAL must be a number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        let state_file = match non_empty(lookup, "STATE_FILE") {
            Some(path) => PathBuf::from(path),
            None => default_state_file()?,
        };

        Ok(Self {
            webhook_url: non_empty(lookup, "FEISHU_WEBHOOK_URL"),
            poll_interval_secs,
            state_file,
        })
    }

    /// The polling interval, clamped to the minimum.
    pub fn effective_poll_interval(&self) -> u64 {
        self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS)
    }
}

/// `<local data dir>/zentao-notify/state.json`.
fn default_state_file() -> Result<PathBuf> {
    let base_dir = dirs::data_local_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base_dir.join("zentao-notify").join("state.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::from_lookup(&lookup_from(&[("STATE_FILE", "state.json")])).unwrap();
        assert_eq!(settings.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert!(settings.webhook_url.is_none());
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let err = Settings::from_lookup(&lookup_from(&[
            ("STATE_FILE", "state.json"),
            ("POLL_INTERVAL", "five minutes"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL"));
    }

    #[test]
    fn test_interval_is_clamped() {
        let settings = Settings::from_lookup(&lookup_from(&[
            ("STATE_FILE", "state.json"),
            ("POLL_INTERVAL", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.poll_interval_secs, 5);
        assert_eq!(settings.effective_poll_interval(), MIN_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_blank_webhook_is_none() {
        let settings = Settings::from_lookup(&lookup_from(&[
            ("STATE_FILE", "state.json"),
            ("FEISHU_WEBHOOK_URL", "   "),
        ]))
        .unwrap();
        assert!(settings.webhook_url.is_none());
    }

    #[test]
    fn test_default_state_file_location() {
        if let Ok(path) = default_state_file() {
            assert!(path.ends_with("zentao-notify/state.json"));
        }
    }
}

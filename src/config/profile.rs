//! ZenTao connection profile.

use crate::api::Credentials;

use super::{non_empty, ConfigError, Result};

/// ZenTao connection settings.
///
/// Secrets are kept out of the `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ZentaoProfile {
    /// The ZenTao instance URL, without trailing slashes.
    pub base_url: String,

    /// The login account.
    pub account: String,

    /// The account password. Takes precedence over the API key.
    pub password: String,

    /// An API key accepted in place of the password.
    pub api_key: String,

    /// Always use the legacy session API instead of probing.
    pub force_legacy: bool,

    /// Only poll these products; `None` polls every product.
    pub product_ids: Option<Vec<String>>,
}

impl ZentaoProfile {
    /// Read the profile from `ZENTAO_*` variables.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: non_empty(lookup, "ZENTAO_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            account: non_empty(lookup, "ZENTAO_ACCOUNT").unwrap_or_default(),
            password: lookup("ZENTAO_PASSWORD").unwrap_or_default(),
            api_key: lookup("ZENTAO_API_KEY").unwrap_or_default(),
            force_legacy: non_empty(lookup, "ZENTAO_LEGACY")
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
            product_ids: non_empty(lookup, "ZENTAO_PRODUCT_IDS")
                .map(|ids| parse_product_ids(&ids))
                .filter(|ids| !ids.is_empty()),
        }
    }

    /// Validate this profile.
    ///
    /// Checks that:
    /// - The URL is non-empty and uses http:// or https://
    /// - The account is non-empty
    /// - A password or API key is set
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "ZENTAO_BASE_URL is not set".to_string(),
            ));
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "ZENTAO_BASE_URL '{}' must start with http:// or https://",
                self.base_url
            )));
        }

        if self.account.is_empty() {
            return Err(ConfigError::ValidationError(
                "ZENTAO_ACCOUNT is not set".to_string(),
            ));
        }

        if self.password.is_empty() && self.api_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "one of ZENTAO_PASSWORD or ZENTAO_API_KEY must be set".to_string(),
            ));
        }

        Ok(())
    }

    /// Build client credentials from this profile.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.base_url, &self.account, &self.password, &self.api_key)
            .with_force_legacy(self.force_legacy)
    }
}

impl std::fmt::Debug for ZentaoProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZentaoProfile")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("force_legacy", &self.force_legacy)
            .field("product_ids", &self.product_ids)
            .finish_non_exhaustive()
    }
}

/// Split a comma-separated id list, dropping blanks.
fn parse_product_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

//! Credentials, API dialects and session state for ZenTao.
//!
//! ZenTao servers expose one of three mutually incompatible APIs depending
//! on their version. The client negotiates the dialect at login time and
//! keeps the resulting credential artifact (a `Token` header or a session
//! cookie) in [`Session`].

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

use super::error::{ApiError, Result};
use super::types::text_of;

/// Case-insensitive markers that identify an auth failure message.
const AUTH_FAIL_MARKERS: &[&str] = &[
    "token",
    "login",
    "auth",
    "unauthorized",
    "登录",
    "认证",
    "授权",
    "令牌",
];

/// Fields that may carry a human-readable failure message.
const MESSAGE_FIELDS: &[&str] = &["message", "reason", "error"];

/// Connection credentials, immutable for the lifetime of a client.
#[derive(Clone)]
pub struct Credentials {
    base_url: String,
    account: String,
    password: String,
    api_key: String,
    force_legacy: bool,
}

impl Credentials {
    /// Create credentials. Trailing slashes are stripped from the URL.
    pub fn new(base_url: &str, account: &str, password: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            account: account.trim().to_string(),
            password: password.to_string(),
            api_key: api_key.to_string(),
            force_legacy: false,
        }
    }

    /// Skip dialect probing and always use the legacy session API.
    pub fn with_force_legacy(mut self, force_legacy: bool) -> Self {
        self.force_legacy = force_legacy;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the account name.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Whether legacy mode is forced.
    pub fn force_legacy(&self) -> bool {
        self.force_legacy
    }

    /// The secret sent at login: the password, else the API key.
    pub fn secret(&self) -> &str {
        if self.password.is_empty() {
            &self.api_key
        } else {
            &self.password
        }
    }

    /// Check the login preconditions.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the base URL or account is empty,
    /// or if neither a password nor an API key is set.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() || self.account.is_empty() {
            return Err(ApiError::Configuration(
                "ZENTAO_BASE_URL and ZENTAO_ACCOUNT must be set".to_string(),
            ));
        }
        if self.secret().is_empty() {
            return Err(ApiError::Configuration(
                "one of ZENTAO_PASSWORD or ZENTAO_API_KEY must be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("force_legacy", &self.force_legacy)
            .finish_non_exhaustive()
    }
}

/// A ZenTao API dialect.
///
/// Preference order is `V2 > V1 > Legacy`; see [`Dialect::fallbacks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// REST API v2 with token auth.
    V2,
    /// REST API v1 with token auth.
    V1,
    /// Session-cookie API of older servers.
    Legacy,
}

impl Dialect {
    /// The REST path prefix, or `None` for the legacy dialect.
    pub fn rest_prefix(&self) -> Option<&'static str> {
        match self {
            Dialect::V2 => Some("api.php/v2"),
            Dialect::V1 => Some("api.php/v1"),
            Dialect::Legacy => None,
        }
    }

    /// The token login endpoint, or `None` for the legacy dialect.
    pub fn login_path(&self) -> Option<&'static str> {
        match self {
            Dialect::V2 => Some("api.php/v2/users/login"),
            Dialect::V1 => Some("api.php/v1/tokens"),
            Dialect::Legacy => None,
        }
    }

    /// Dialects to try, in order, starting from `self`.
    pub fn fallbacks(&self) -> &'static [Dialect] {
        match self {
            Dialect::V2 => &[Dialect::V2, Dialect::V1, Dialect::Legacy],
            Dialect::V1 => &[Dialect::V1, Dialect::Legacy],
            Dialect::Legacy => &[Dialect::Legacy],
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::V2 => write!(f, "v2"),
            Dialect::V1 => write!(f, "v1"),
            Dialect::Legacy => write!(f, "legacy"),
        }
    }
}

/// The credential artifact a dialect attaches to each request.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionAuth {
    /// `Token: <token>` header (v1/v2).
    Token(String),
    /// `Cookie: <name>=<id>` header (legacy).
    Cookie { name: String, id: String },
}

impl fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionAuth::Token(_) => write!(f, "Token(..)"),
            SessionAuth::Cookie { name, .. } => write!(f, "Cookie({}=..)", name),
        }
    }
}

/// Mutable session state.
///
/// Invariant: `logged_in` implies `auth` holds the artifact the active
/// dialect requires.
#[derive(Debug, Clone, Default)]
pub struct Session {
    dialect: Option<Dialect>,
    auth: Option<SessionAuth>,
    logged_in: bool,
}

impl Session {
    /// Record a successful token login.
    pub fn set_token(&mut self, dialect: Dialect, token: String) {
        self.dialect = Some(dialect);
        self.auth = Some(SessionAuth::Token(token));
        self.logged_in = true;
    }

    /// Set the legacy session cookie, dropping any stale token.
    ///
    /// The session is not logged in until [`Session::mark_legacy_login`].
    pub fn set_cookie(&mut self, name: String, id: String) {
        self.auth = Some(SessionAuth::Cookie { name, id });
        self.logged_in = false;
    }

    /// Record a successful legacy login on the current cookie.
    pub fn mark_legacy_login(&mut self) {
        if matches!(self.auth, Some(SessionAuth::Cookie { .. })) {
            self.dialect = Some(Dialect::Legacy);
            self.logged_in = true;
        }
    }

    /// Drop the login. The negotiated dialect is kept for the next login.
    pub fn clear_login(&mut self) {
        self.logged_in = false;
        self.auth = None;
    }

    /// The active (or last negotiated) dialect.
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// The credential artifact for requests.
    pub fn auth(&self) -> Option<&SessionAuth> {
        self.auth.as_ref()
    }

    /// Whether a usable login is held.
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }
}

/// Whether the response signals an expired or rejected login.
///
/// True for HTTP 401/403, or for a failure envelope whose message mentions
/// tokens, login or authorization.
pub fn is_auth_fail(status: StatusCode, body: &Value) -> bool {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return true;
    }
    if !is_failure_envelope(body) {
        return false;
    }
    let message = failure_message(body).to_lowercase();
    AUTH_FAIL_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Whether the body carries a `status` field other than `success`.
pub(crate) fn is_failure_envelope(body: &Value) -> bool {
    match body.get("status") {
        Some(Value::String(s)) => !s.eq_ignore_ascii_case("success"),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// The human-readable message of a failure envelope, or empty.
pub(crate) fn failure_message(body: &Value) -> String {
    MESSAGE_FIELDS
        .iter()
        .map(|field| match body.get(*field) {
            Some(value @ (Value::Object(_) | Value::Array(_))) => value.to_string(),
            other => text_of(other),
        })
        .find(|message| !message.is_empty())
        .unwrap_or_default()
}

//! ZenTao API client implementation.
//!
//! This module owns the HTTP client and the session: dialect negotiation at
//! login, the authenticated GET used by every accessor, auth-failure
//! detection and the relogin-and-retry-once policy.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::auth::{
    failure_message, is_auth_fail, is_failure_envelope, Credentials, Dialect, Session,
    SessionAuth,
};
use super::error::{ApiError, Result};
use super::types::text_of;

/// Per-request timeout for API calls.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Legacy endpoint that hands out a fresh session id.
const LEGACY_SESSION_PATH: &str = "api-getSessionID.json";

/// Legacy credential login endpoint.
const LEGACY_LOGIN_PATH: &str = "user-login.json";

/// Outcome of a login attempt against one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// The dialect accepted the credentials.
    Accepted,
    /// The server does not speak this dialect (HTTP 404).
    Unsupported,
}

/// The ZenTao API client.
///
/// Holds one mutable session. Requests are issued one at a time; share a
/// client between workers only with external synchronization, or give each
/// worker its own client.
#[derive(Debug)]
pub struct ZentaoClient {
    /// The HTTP client.
    client: Client,
    /// Connection credentials.
    credentials: Credentials,
    /// The negotiated session.
    session: Mutex<Session>,
}

impl ZentaoClient {
    /// Create a new client. Does NOT log in.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self::with_http_client(credentials, client))
    }

    /// Create a client on top of an existing HTTP client, whose timeout and
    /// proxy settings are used as-is.
    pub fn with_http_client(credentials: Credentials, client: Client) -> Self {
        Self {
            client,
            credentials,
            session: Mutex::new(Session::default()),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active (or last negotiated) dialect.
    pub fn dialect(&self) -> Option<Dialect> {
        self.session().dialect()
    }

    /// Whether the client currently holds a usable login.
    pub fn is_logged_in(&self) -> bool {
        self.session().is_logged_in()
    }

    /// Link to a bug's detail page. No network call.
    pub fn bug_view_url(&self, bug_id: &str) -> String {
        self.url(&format!("bug-view-{}.html", bug_id))
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.credentials.base_url(),
            path.trim_start_matches('/')
        )
    }

    /// Log in with the most modern dialect the server accepts.
    ///
    /// Dialects are probed strictly in the order v2, v1, legacy. Only an
    /// HTTP 404 moves on to the next dialect; any other failure aborts.
    /// After a dialect has been negotiated, later logins start from it.
    ///
    /// # Errors
    ///
    /// - `ApiError::Configuration` if the credentials are incomplete
    /// - `ApiError::Authentication` if the server rejects the login
    #[instrument(skip(self), fields(account = %self.credentials.account()))]
    pub async fn login(&self) -> Result<()> {
        self.credentials.validate()?;

        let start = if self.credentials.force_legacy() {
            Dialect::Legacy
        } else {
            self.dialect().unwrap_or(Dialect::V2)
        };

        for &dialect in start.fallbacks() {
            if dialect == Dialect::Legacy {
                self.legacy_login().await?;
                info!(dialect = %dialect, "ZenTao login succeeded");
                return Ok(());
            }
            match self.token_login(dialect).await? {
                Probe::Accepted => {
                    info!(dialect = %dialect, "ZenTao login succeeded");
                    return Ok(());
                }
                Probe::Unsupported => {
                    debug!(dialect = %dialect, "Dialect not supported, trying next");
                }
            }
        }

        Err(ApiError::Authentication(
            "server supports no known API dialect".to_string(),
        ))
    }

    /// Log in if no usable session is held.
    pub async fn ensure_login(&self) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }
        self.login().await
    }

    /// Drop the current login so the next call logs in again.
    pub fn clear_login(&self) {
        self.session().clear_login();
    }

    /// Token login for the v1/v2 dialects.
    async fn token_login(&self, dialect: Dialect) -> Result<Probe> {
        let Some(path) = dialect.login_path() else {
            return Ok(Probe::Unsupported);
        };
        debug!(dialect = %dialect, "Attempting token login");

        let payload = json!({
            "account": self.credentials.account(),
            "password": self.credentials.secret(),
        });
        let response = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("login request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Probe::Unsupported);
        }
        let body = read_login_body(response).await?;

        let token = text_of(body.get("token"));
        if token.is_empty() {
            return Err(ApiError::Authentication(
                "login response carries no token".to_string(),
            ));
        }

        self.session().set_token(dialect, token);
        Ok(Probe::Accepted)
    }

    /// Two-step cookie login for the legacy dialect.
    async fn legacy_login(&self) -> Result<()> {
        debug!("Attempting legacy session login");

        let response = self
            .client
            .get(self.url(LEGACY_SESSION_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("session request failed: {}", e)))?;
        let body = read_login_body(response).await?;

        let data = legacy_data(&body).unwrap_or_else(|| body.clone());
        let name = text_of(data.get("sessionName"));
        let id = text_of(data.get("sessionID"));
        if name.is_empty() || id.is_empty() {
            return Err(ApiError::Authentication(
                "session response carries no sessionName/sessionID".to_string(),
            ));
        }
        self.session().set_cookie(name, id);

        let request = self
            .client
            .post(self.url(LEGACY_LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("account", self.credentials.account()),
                ("password", self.credentials.secret()),
            ]);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Authentication(format!("login request failed: {}", e)))?;
        read_login_body(response).await?;

        self.session().mark_legacy_login();
        Ok(())
    }

    /// Attach the session's token header or cookie to a request.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let auth = self.session().auth().cloned();
        match auth {
            Some(SessionAuth::Token(token)) => request.header("Token", token),
            Some(SessionAuth::Cookie { name, id }) => {
                request.header(header::COOKIE, format!("{}={}", name, id))
            }
            None => request,
        }
    }

    /// Perform an authenticated GET and return the JSON body.
    ///
    /// Auth failures reset the session and surface as
    /// `ApiError::SessionExpired`.
    #[instrument(skip(self))]
    pub(crate) async fn get_json(&self, path: &str) -> Result<Value> {
        let request = self
            .client
            .get(self.url(path))
            .header(header::ACCEPT, "application/json");
        let response = self.authorize(request).send().await?;

        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text).ok();

        if is_auth_fail(status, body.as_ref().unwrap_or(&Value::Null)) {
            warn!(%status, "ZenTao rejected the session");
            self.clear_login();
            let message = body.as_ref().map(failure_message).unwrap_or_default();
            return Err(ApiError::SessionExpired(if message.is_empty() {
                format!("HTTP {} for {}", status, path)
            } else {
                message
            }));
        }

        if !status.is_success() {
            debug!("Error response body: {}", text);
            let message = body.as_ref().map(failure_message).unwrap_or_default();
            let context = if message.is_empty() {
                path.to_string()
            } else {
                message
            };
            return Err(ApiError::from_status(status, &context));
        }

        let body = body.ok_or_else(|| {
            ApiError::InvalidResponse(format!("{} did not return JSON", path))
        })?;
        if is_failure_envelope(&body) {
            let message = failure_message(&body);
            return Err(ApiError::Api(if message.is_empty() {
                format!("{} returned a failure status", path)
            } else {
                message
            }));
        }
        Ok(body)
    }

    /// Run `op`, logging in again and retrying once if the session expired.
    ///
    /// Logs in first when no session is held. A failed relogin returns its
    /// own error; a second failure of `op` is returned as-is.
    pub async fn with_relogin<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.ensure_login().await?;
        match op().await {
            Err(e) if e.is_session_expired() => {
                warn!("Session expired, logging in again: {}", e);
                self.login().await?;
                op().await
            }
            result => result,
        }
    }
}

/// Read a login response, rejecting non-2xx statuses and failure envelopes.
async fn read_login_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Authentication(format!("login response unreadable: {}", e)))?;
    let body = serde_json::from_str::<Value>(&text).ok();

    if !status.is_success() {
        return Err(login_rejected(status, body.as_ref()));
    }
    let body = body
        .ok_or_else(|| ApiError::Authentication("login response is not JSON".to_string()))?;
    if is_failure_envelope(&body) {
        return Err(login_rejected(status, Some(&body)));
    }
    Ok(body)
}

/// Build the error for a rejected login.
fn login_rejected(status: StatusCode, body: Option<&Value>) -> ApiError {
    let message = body.map(failure_message).unwrap_or_default();
    if message.is_empty() {
        ApiError::Authentication(format!("login rejected (HTTP {})", status))
    } else {
        ApiError::Authentication(message)
    }
}

/// The payload of a legacy envelope.
///
/// Legacy responses wrap their payload in `data` (or `result`), sometimes
/// as a JSON-encoded string.
pub(crate) fn legacy_data(body: &Value) -> Option<Value> {
    ["data", "result"].iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|v| v.is_object() || v.is_array()),
        Some(value @ (Value::Object(_) | Value::Array(_))) => Some(value.clone()),
        _ => None,
    })
}

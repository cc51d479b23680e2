//! HTTP client for the AquaSense backend REST API.
//!
//! [`ApiClient`] implements [`AquaApi`] over `reqwest`. Every authorized
//! call reads the current token from the shared [`AuthSession`] and attaches
//! it as `Authorization: Bearer <token>`; with no token the request goes out
//! unauthenticated. A 401 on an authorized call invalidates the session if
//! the token it carried is still current.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aquasense_core::{ApiClient, AquaApi, AuthSession, ClientConfig};
//! use aquasense_types::MetricKind;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(AuthSession::in_memory());
//! let client = ApiClient::new(ClientConfig::new("http://localhost:8000"), session)?;
//!
//! let reading = client.latest(MetricKind::Ph).await?;
//! println!("pH: {:.2}", reading.value);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::Date;
use time::macros::format_description;
use tracing::{debug, warn};

use aquasense_types::{
    CommandAck, DailyTableRow, DeviceAction, DeviceId, MetricKind, MonthlyTableRow, NewUser,
    Reading, SummaryRecord, SystemAnalysis, UserPatch, UserProfile, unwrap_list,
};

use crate::api::{AquaApi, LoginGrant, SummaryQuery};
use crate::error::{Error, Result};
use crate::session::AuthSession;

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Prefix for the `/auth` and `/users` routes (`""` or e.g. `"/v1"`).
    pub account_prefix: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            account_prefix: String::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the account route prefix.
    #[must_use]
    pub fn account_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.account_prefix = prefix.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(Error::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        let prefix = self.account_prefix.trim();
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(Error::invalid_config(format!(
                "account prefix must start with '/', got: {prefix}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid_config("timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

/// Whether a request carries the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

/// HTTP client for the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    account_prefix: String,
    session: Arc<AuthSession>,
}

impl ApiClient {
    /// Create a new client sharing `session`.
    pub fn new(config: ClientConfig, session: Arc<AuthSession>) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::invalid_config(e.to_string()))?;
        Ok(Self::with_client(config, session, http))
    }

    /// Create a client with a custom reqwest Client. The configuration is
    /// taken as already validated.
    pub fn with_client(config: ClientConfig, session: Arc<AuthSession>, http: Client) -> Self {
        Self {
            http,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            account_prefix: config.account_prefix.trim().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session this client authorizes with.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.account_prefix, path)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn execute(
        &self,
        method: Method,
        url: String,
        auth: Auth,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<Value> {
        let token = match auth {
            Auth::Bearer => self.session.token().await,
            Auth::Anonymous => None,
        };

        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        let request = build(request);

        debug!(%method, %url, authorized = token.is_some(), "Sending request");
        let response = request.send().await.map_err(|e| Error::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| Error::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let body: Option<Value> = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        if status == StatusCode::UNAUTHORIZED && auth == Auth::Bearer {
            warn!(%url, "Authorization rejected by backend");
            if let Some(token) = &token {
                let reason = body
                    .as_ref()
                    .and_then(backend_message)
                    .unwrap_or_else(|| "Session expired".to_string());
                self.session.invalidate_if_current(token, &reason).await;
            }
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(backend_message)
                .unwrap_or_else(|| generic_message(status));
            return Err(Error::rejected(status.as_u16(), message));
        }

        match body {
            Some(value) => Ok(value),
            None if bytes.is_empty() => Ok(Value::Null),
            None => Err(Error::Decode(format!("{url}: response is not JSON"))),
        }
    }

    async fn get(&self, url: String) -> Result<Value> {
        self.execute(Method::GET, url, Auth::Bearer, |r| r).await
    }

    async fn get_query(&self, url: String, query: Vec<(&'static str, String)>) -> Result<Value> {
        self.execute(Method::GET, url, Auth::Bearer, move |r| r.query(&query))
            .await
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `detail` (string, or a list of `{msg}` validation items),
/// then `message`, then `error`.
fn backend_message(body: &Value) -> Option<String> {
    match body.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(String::from)
}

fn generic_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Request failed: {} {reason}", status.as_u16()),
        None => format!("Request failed with status {}", status.as_u16()),
    }
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(format!("{what}: {e}")))
}

/// Reject ids that would escape their URL path segment.
fn path_segment(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#', '%']) || id.contains(char::is_whitespace) {
        return Err(Error::validation(format!("invalid user id '{id}'")));
    }
    Ok(id)
}

fn iso_date(date: Date) -> Result<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| Error::validation(e.to_string()))
}

#[async_trait]
impl AquaApi for ApiClient {
    async fn latest(&self, metric: MetricKind) -> Result<Reading> {
        let body = self
            .get(self.url(&format!("/sensors/latest/{}", metric.segment())))
            .await?;
        Ok(Reading::from_record(metric, &body)?)
    }

    async fn history(&self, metric: MetricKind, limit: usize) -> Result<Vec<Value>> {
        let body = self
            .get_query(
                self.url(&format!("/sensors/history/{}", metric.segment())),
                vec![("limit", limit.to_string())],
            )
            .await?;
        if !body.is_array() && body.get("data").is_none() && body.get("items").is_none() {
            return Err(Error::Decode(format!(
                "history for {metric} is not a list of records"
            )));
        }
        Ok(unwrap_list(body))
    }

    async fn analysis(&self) -> Result<SystemAnalysis> {
        let body = self.get(self.url("/sensors/status/analysis")).await?;
        decode("system analysis", body)
    }

    async fn summary(&self, query: SummaryQuery) -> Result<SummaryRecord> {
        query.validate()?;
        let params = match query {
            SummaryQuery::Daily { date: Some(date) } => vec![("date", iso_date(date)?)],
            SummaryQuery::Daily { date: None } => Vec::new(),
            SummaryQuery::Monthly { month, year } => {
                vec![("month", month.to_string()), ("year", year.to_string())]
            }
        };
        let period = query.period();
        let body = self
            .get_query(
                self.url(&format!("/reports/summary/{}", period.as_str())),
                params,
            )
            .await?;
        Ok(SummaryRecord::new(period, body))
    }

    async fn daily_table(&self, date: Option<Date>) -> Result<Vec<DailyTableRow>> {
        let params = match date {
            Some(date) => vec![("date", iso_date(date)?)],
            None => Vec::new(),
        };
        let body = self
            .get_query(self.url("/reports/table/daily"), params)
            .await?;
        Ok(unwrap_list(body))
    }

    async fn monthly_table(&self, month: u8, year: i32) -> Result<Vec<MonthlyTableRow>> {
        SummaryQuery::Monthly { month, year }.validate()?;
        let body = self
            .get_query(
                self.url("/reports/table/monthly"),
                vec![("month", month.to_string()), ("year", year.to_string())],
            )
            .await?;
        Ok(unwrap_list(body))
    }

    async fn control(&self, device: &DeviceId, action: DeviceAction) -> Result<CommandAck> {
        let url = self.url(&format!("/control/{}/{}", device.as_str(), action.as_str()));
        let body = self.execute(Method::POST, url, Auth::Bearer, |r| r).await?;
        if body.is_null() {
            return Ok(CommandAck {
                status: String::new(),
                message: String::new(),
                device: Some(device.to_string()),
                action: Some(action.to_string()),
            });
        }
        decode("command acknowledgement", body)
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant> {
        let form = [
            ("username", username.to_string()),
            ("password", password.to_string()),
        ];
        let body = self
            .execute(
                Method::POST,
                self.account_url("/auth/login"),
                Auth::Anonymous,
                move |r| r.form(&form),
            )
            .await
            .map_err(|e| match e {
                Error::ServerRejection { status, .. } if status == 401 => {
                    Error::rejected(status, "Invalid username or password")
                }
                other => other,
            })?;
        let grant: LoginGrant = decode("login response", body)?;
        if grant.access_token.is_empty() {
            return Err(Error::Decode("login response has an empty access_token".into()));
        }
        Ok(grant)
    }

    async fn me(&self) -> Result<UserProfile> {
        let body = self.get(self.account_url("/users/me")).await?;
        decode("user profile", body)
    }

    async fn logout(&self) -> Result<()> {
        self.execute(
            Method::POST,
            self.account_url("/auth/logout"),
            Auth::Bearer,
            |r| r.json(&json!({})),
        )
        .await?;
        Ok(())
    }

    async fn list_users(&self, search: Option<&str>, limit: usize) -> Result<Vec<UserProfile>> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        let body = self.get_query(self.account_url("/users"), params).await?;
        Ok(unwrap_list(body))
    }

    async fn register_user(&self, user: &NewUser) -> Result<Value> {
        let payload = serde_json::to_value(user)?;
        self.execute(
            Method::POST,
            self.account_url("/users/register"),
            Auth::Bearer,
            move |r| r.json(&payload),
        )
        .await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<Value> {
        let url = self.account_url(&format!("/users/{}", path_segment(id)?));
        let payload = serde_json::to_value(patch)?;
        self.execute(Method::PATCH, url, Auth::Bearer, move |r| r.json(&payload))
            .await
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let url = self.account_url(&format!("/users/{}", path_segment(id)?));
        self.execute(Method::DELETE, url, Auth::Bearer, |r| r)
            .await?;
        Ok(())
    }

    async fn reset_password(&self, id: &str, new_password: &str) -> Result<()> {
        let url = self.account_url(&format!("/users/{}/reset-password", path_segment(id)?));
        let payload = json!({ "new_password": new_password });
        self.execute(Method::POST, url, Auth::Bearer, move |r| r.json(&payload))
            .await?;
        Ok(())
    }
}

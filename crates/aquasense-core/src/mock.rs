//! Mock backend implementation for testing.
//!
//! The [`MockBackend`] implements the [`AquaApi`] trait, allowing it to be
//! used interchangeably with the HTTP client in generic code.
//!
//! # Features
//!
//! - **Failure injection**: Fail individual metrics, the analysis call,
//!   commands or logout with a chosen [`MockFailure`]
//! - **Latency simulation**: Delay individual metrics to reorder completions
//! - **Call counters**: Observe how many requests each operation received

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;

use aquasense_types::{
    BackendTime, CommandAck, DailyTableRow, DeviceAction, DeviceId, MetricKind,
    MonthlyTableRow, NewUser, Reading, SummaryPeriod, SummaryRecord, SystemAnalysis, UserPatch,
    UserProfile,
};

use crate::api::{AquaApi, LoginGrant, SummaryQuery};
use crate::error::{Error, Result};

/// Token handed out by [`MockBackend::login`].
pub const MOCK_TOKEN: &str = "mock-token";

/// Kind of failure to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Transport failure, as if the backend were down.
    Network,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 404.
    NotFound,
    /// HTTP 500.
    Server,
    /// A 4xx rejection with the given message.
    Rejected(String),
}

impl MockFailure {
    fn to_error(&self, what: &str) -> Error {
        match self {
            MockFailure::Network => Error::Network {
                url: format!("mock://{what}"),
                message: "connection refused".into(),
            },
            MockFailure::Unauthorized => Error::Unauthorized,
            MockFailure::NotFound => Error::rejected(404, "Not Found"),
            MockFailure::Server => Error::rejected(500, "Internal Server Error"),
            MockFailure::Rejected(message) => Error::rejected(400, message.clone()),
        }
    }
}

/// A mock backend for testing.
///
/// # Example
///
/// ```
/// use aquasense_core::{AquaApi, MockBackend, MockFailure};
/// use aquasense_types::MetricKind;
///
/// #[tokio::main]
/// async fn main() {
///     let backend = MockBackend::builder().reading(MetricKind::Ph, 7.2).build();
///     backend.fail_metric(MetricKind::Temperature, MockFailure::Network).await;
///
///     assert_eq!(backend.latest(MetricKind::Ph).await.unwrap().value, 7.2);
///     assert!(backend.latest(MetricKind::Temperature).await.is_err());
/// }
/// ```
#[derive(Debug)]
pub struct MockBackend {
    readings: RwLock<HashMap<MetricKind, f64>>,
    history: RwLock<HashMap<MetricKind, Vec<Value>>>,
    analysis: RwLock<SystemAnalysis>,
    summaries: RwLock<HashMap<SummaryPeriod, Value>>,
    daily_rows: RwLock<Vec<DailyTableRow>>,
    monthly_rows: RwLock<Vec<MonthlyTableRow>>,
    users: RwLock<Vec<UserProfile>>,
    credentials: (String, String),
    metric_failures: RwLock<HashMap<MetricKind, MockFailure>>,
    analysis_failure: RwLock<Option<MockFailure>>,
    summary_failure: RwLock<Option<MockFailure>>,
    control_failure: RwLock<Option<MockFailure>>,
    logout_failure: RwLock<Option<MockFailure>>,
    latencies: RwLock<HashMap<MetricKind, Duration>>,
    control_latency: RwLock<Duration>,
    latest_calls: AtomicU32,
    history_calls: AtomicU32,
    control_calls: AtomicU32,
    logout_calls: AtomicU32,
}

impl MockBackend {
    /// Create a mock backend with default values.
    pub fn new() -> Self {
        MockBackendBuilder::default().build()
    }

    /// Create a builder for customizing the mock backend.
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    /// Set the latest value of a metric.
    pub async fn set_reading(&self, metric: MetricKind, value: f64) {
        self.readings.write().await.insert(metric, value);
    }

    /// Forget the value of a metric; `latest` then fails to decode, as with
    /// a record that lacks the metric's field.
    pub async fn remove_reading(&self, metric: MetricKind) {
        self.readings.write().await.remove(&metric);
    }

    /// Set the history records of a metric, newest first.
    pub async fn set_history(&self, metric: MetricKind, records: Vec<Value>) {
        self.history.write().await.insert(metric, records);
    }

    /// Set the analysis returned by the status endpoint.
    pub async fn set_analysis(&self, status: &str, message: Option<&str>) {
        *self.analysis.write().await = SystemAnalysis {
            status: status.to_string(),
            message: message.map(String::from),
            extra: serde_json::Map::new(),
        };
    }

    /// Set the raw summary body for a period.
    pub async fn set_summary(&self, period: SummaryPeriod, body: Value) {
        self.summaries.write().await.insert(period, body);
    }

    pub async fn set_daily_rows(&self, rows: Vec<DailyTableRow>) {
        *self.daily_rows.write().await = rows;
    }

    pub async fn set_monthly_rows(&self, rows: Vec<MonthlyTableRow>) {
        *self.monthly_rows.write().await = rows;
    }

    /// Make every request for `metric` fail.
    pub async fn fail_metric(&self, metric: MetricKind, failure: MockFailure) {
        self.metric_failures.write().await.insert(metric, failure);
    }

    /// Make every metric fail except `keep`.
    pub async fn fail_all_metrics_except(&self, keep: MetricKind, failure: MockFailure) {
        let mut failures = self.metric_failures.write().await;
        for metric in MetricKind::ALL {
            if metric != keep {
                failures.insert(metric, failure.clone());
            }
        }
    }

    pub async fn fail_analysis(&self, failure: Option<MockFailure>) {
        *self.analysis_failure.write().await = failure;
    }

    pub async fn fail_summary(&self, failure: Option<MockFailure>) {
        *self.summary_failure.write().await = failure;
    }

    pub async fn fail_control(&self, failure: Option<MockFailure>) {
        *self.control_failure.write().await = failure;
    }

    pub async fn fail_logout(&self, failure: Option<MockFailure>) {
        *self.logout_failure.write().await = failure;
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        self.metric_failures.write().await.clear();
        *self.analysis_failure.write().await = None;
        *self.summary_failure.write().await = None;
        *self.control_failure.write().await = None;
        *self.logout_failure.write().await = None;
    }

    /// Delay responses for `metric` (latest and history).
    pub async fn set_latency(&self, metric: MetricKind, latency: Duration) {
        self.latencies.write().await.insert(metric, latency);
    }

    /// Delay control command responses.
    pub async fn set_control_latency(&self, latency: Duration) {
        *self.control_latency.write().await = latency;
    }

    /// Number of `latest` calls received.
    pub fn latest_calls(&self) -> u32 {
        self.latest_calls.load(Ordering::Relaxed)
    }

    /// Number of `history` calls received.
    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::Relaxed)
    }

    /// Number of `control` calls received.
    pub fn control_calls(&self) -> u32 {
        self.control_calls.load(Ordering::Relaxed)
    }

    /// Number of `logout` calls received.
    pub fn logout_calls(&self) -> u32 {
        self.logout_calls.load(Ordering::Relaxed)
    }

    /// Users currently registered.
    pub async fn users(&self) -> Vec<UserProfile> {
        self.users.read().await.clone()
    }

    async fn metric_gate(&self, metric: MetricKind) -> Result<()> {
        let latency = self.latencies.read().await.get(&metric).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.metric_failures.read().await.get(&metric) {
            Some(failure) => Err(failure.to_error(metric.segment())),
            None => Ok(()),
        }
    }

    async fn find_user_index(&self, id: &str) -> Result<usize> {
        self.users
            .read()
            .await
            .iter()
            .position(|u| u.id.as_deref() == Some(id))
            .ok_or_else(|| Error::rejected(404, "User not found"))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AquaApi for MockBackend {
    async fn latest(&self, metric: MetricKind) -> Result<Reading> {
        self.latest_calls.fetch_add(1, Ordering::Relaxed);
        self.metric_gate(metric).await?;
        let value = self
            .readings
            .read()
            .await
            .get(&metric)
            .copied()
            .ok_or_else(|| Error::Decode(format!("no {metric} reading")))?;
        Ok(Reading {
            metric,
            value,
            timestamp: Some(BackendTime::Zoned(OffsetDateTime::now_utc())),
        })
    }

    async fn history(&self, metric: MetricKind, limit: usize) -> Result<Vec<Value>> {
        self.history_calls.fetch_add(1, Ordering::Relaxed);
        self.metric_gate(metric).await?;
        let history = self.history.read().await;
        Ok(history
            .get(&metric)
            .map(|records| records.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn analysis(&self) -> Result<SystemAnalysis> {
        if let Some(failure) = self.analysis_failure.read().await.as_ref() {
            return Err(failure.to_error("analysis"));
        }
        Ok(self.analysis.read().await.clone())
    }

    async fn summary(&self, query: SummaryQuery) -> Result<SummaryRecord> {
        query.validate()?;
        if let Some(failure) = self.summary_failure.read().await.as_ref() {
            return Err(failure.to_error("summary"));
        }
        let period = query.period();
        let body = self
            .summaries
            .read()
            .await
            .get(&period)
            .cloned()
            .unwrap_or_else(|| json!({"message": "No data"}));
        Ok(SummaryRecord::new(period, body))
    }

    async fn daily_table(&self, _date: Option<Date>) -> Result<Vec<DailyTableRow>> {
        if let Some(failure) = self.summary_failure.read().await.as_ref() {
            return Err(failure.to_error("daily table"));
        }
        Ok(self.daily_rows.read().await.clone())
    }

    async fn monthly_table(&self, month: u8, year: i32) -> Result<Vec<MonthlyTableRow>> {
        SummaryQuery::Monthly { month, year }.validate()?;
        if let Some(failure) = self.summary_failure.read().await.as_ref() {
            return Err(failure.to_error("monthly table"));
        }
        Ok(self.monthly_rows.read().await.clone())
    }

    async fn control(&self, device: &DeviceId, action: DeviceAction) -> Result<CommandAck> {
        self.control_calls.fetch_add(1, Ordering::Relaxed);
        let latency = *self.control_latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(failure) = self.control_failure.read().await.as_ref() {
            return Err(failure.to_error("control"));
        }
        // Unknown devices are refused inside a 2xx body, like the real backend.
        if !device.is_known() {
            return Ok(CommandAck {
                status: "error".into(),
                message: format!("Unknown device: {device}"),
                device: Some(device.to_string()),
                action: Some(action.to_string()),
            });
        }
        Ok(CommandAck {
            status: "success".into(),
            message: format!("Command sent to {device}"),
            device: Some(device.to_string()),
            action: Some(action.to_string()),
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant> {
        if (username, password) != (self.credentials.0.as_str(), self.credentials.1.as_str()) {
            return Err(Error::rejected(401, "Invalid username or password"));
        }
        Ok(LoginGrant {
            access_token: MOCK_TOKEN.to_string(),
            token_type: Some("bearer".into()),
            user: None,
        })
    }

    async fn me(&self) -> Result<UserProfile> {
        let username = &self.credentials.0;
        self.users
            .read()
            .await
            .iter()
            .find(|u| &u.username == username)
            .cloned()
            .ok_or_else(|| Error::rejected(404, "User not found"))
    }

    async fn logout(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::Relaxed);
        match self.logout_failure.read().await.as_ref() {
            Some(failure) => Err(failure.to_error("logout")),
            None => Ok(()),
        }
    }

    async fn list_users(&self, search: Option<&str>, limit: usize) -> Result<Vec<UserProfile>> {
        let needle = search.map(str::to_lowercase).unwrap_or_default();
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| needle.is_empty() || u.username.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn register_user(&self, user: &NewUser) -> Result<Value> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(Error::rejected(400, "Username already registered"));
        }
        let profile = UserProfile {
            id: Some((users.len() + 1).to_string()),
            username: user.username.clone(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            role: Some(user.role.as_str().to_string()),
            is_active: Some(true),
        };
        users.push(profile.clone());
        Ok(serde_json::to_value(profile)?)
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<Value> {
        let index = self.find_user_index(id).await?;
        let mut users = self.users.write().await;
        let user = &mut users[index];
        if let Some(name) = &patch.name {
            user.name = Some(name.clone());
        }
        if let Some(email) = &patch.email {
            user.email = Some(email.clone());
        }
        if let Some(role) = patch.role {
            user.role = Some(role.as_str().to_string());
        }
        if let Some(active) = patch.is_active {
            user.is_active = Some(active);
        }
        Ok(serde_json::to_value(user.clone())?)
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let index = self.find_user_index(id).await?;
        self.users.write().await.remove(index);
        Ok(())
    }

    async fn reset_password(&self, id: &str, _new_password: &str) -> Result<()> {
        self.find_user_index(id).await.map(|_| ())
    }
}

/// Builder for creating mock backends with custom settings.
#[derive(Debug, Clone)]
pub struct MockBackendBuilder {
    readings: HashMap<MetricKind, f64>,
    analysis_status: String,
    username: String,
    password: String,
}

impl Default for MockBackendBuilder {
    fn default() -> Self {
        let readings = HashMap::from([
            (MetricKind::Temperature, 27.5),
            (MetricKind::Ph, 7.1),
            (MetricKind::Turbidity, 4.2),
            (MetricKind::Ammonia, 0.02),
            (MetricKind::DissolvedSolids, 310.0),
        ]);
        Self {
            readings,
            analysis_status: "normal".into(),
            username: "admin".into(),
            password: "password123".into(),
        }
    }
}

impl MockBackendBuilder {
    /// Set the initial value of a metric.
    #[must_use]
    pub fn reading(mut self, metric: MetricKind, value: f64) -> Self {
        self.readings.insert(metric, value);
        self
    }

    /// Set the initial analysis status.
    #[must_use]
    pub fn analysis_status(mut self, status: &str) -> Self {
        self.analysis_status = status.to_string();
        self
    }

    /// Set the credentials `login` accepts.
    #[must_use]
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Build the mock backend.
    #[must_use]
    pub fn build(self) -> MockBackend {
        let admin = UserProfile {
            id: Some("1".into()),
            username: self.username.clone(),
            name: Some("Administrator".into()),
            email: None,
            role: Some("admin".into()),
            is_active: Some(true),
        };
        MockBackend {
            readings: RwLock::new(self.readings),
            history: RwLock::new(HashMap::new()),
            analysis: RwLock::new(SystemAnalysis {
                status: self.analysis_status,
                message: None,
                extra: serde_json::Map::new(),
            }),
            summaries: RwLock::new(HashMap::new()),
            daily_rows: RwLock::new(Vec::new()),
            monthly_rows: RwLock::new(Vec::new()),
            users: RwLock::new(vec![admin]),
            credentials: (self.username, self.password),
            metric_failures: RwLock::new(HashMap::new()),
            analysis_failure: RwLock::new(None),
            summary_failure: RwLock::new(None),
            control_failure: RwLock::new(None),
            logout_failure: RwLock::new(None),
            latencies: RwLock::new(HashMap::new()),
            control_latency: RwLock::new(Duration::ZERO),
            latest_calls: AtomicU32::new(0),
            history_calls: AtomicU32::new(0),
            control_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
        }
    }
}

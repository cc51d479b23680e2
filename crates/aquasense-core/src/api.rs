//! Trait abstraction over the AquaSense backend.
//!
//! This module provides the [`AquaApi`] trait that abstracts over the real
//! HTTP client ([`crate::ApiClient`]) and the in-process mock
//! ([`crate::MockBackend`]) so the poller, dispatcher and aggregators can be
//! tested without a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use aquasense_types::{
    CommandAck, DailyTableRow, DeviceAction, DeviceId, MetricKind, MonthlyTableRow, NewUser,
    Reading, SummaryPeriod, SummaryRecord, SystemAnalysis, UserPatch, UserProfile,
};

use crate::error::{Error, Result};

/// Parameters of a summary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryQuery {
    /// Daily rollup; `None` means "today" as the backend sees it.
    Daily { date: Option<Date> },
    /// Monthly rollup for `month` (1-12) of `year`.
    Monthly { month: u8, year: i32 },
}

impl SummaryQuery {
    #[must_use]
    pub fn period(&self) -> SummaryPeriod {
        match self {
            SummaryQuery::Daily { .. } => SummaryPeriod::Daily,
            SummaryQuery::Monthly { .. } => SummaryPeriod::Monthly,
        }
    }

    /// Reject a month outside 1-12.
    pub fn validate(&self) -> Result<()> {
        if let SummaryQuery::Monthly { month, .. } = self
            && !(1..=12).contains(month)
        {
            return Err(Error::validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(())
    }
}

/// Token grant returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Some deployments return the profile alongside the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// Trait abstracting the backend REST API.
///
/// Implementations attach the session's bearer token to authorized calls
/// and report a rejected token as [`Error::Unauthorized`].
///
/// # Example
///
/// ```ignore
/// use aquasense_core::{AquaApi, Result};
/// use aquasense_types::MetricKind;
///
/// async fn print_ph<A: AquaApi>(api: &A) -> Result<()> {
///     let reading = api.latest(MetricKind::Ph).await?;
///     println!("pH: {:.2}", reading.value);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait AquaApi: Send + Sync {
    // --- Telemetry ---

    /// Latest reading of one metric (`GET /sensors/latest/{metric}`).
    async fn latest(&self, metric: MetricKind) -> Result<Reading>;

    /// Raw history records of one metric, newest first
    /// (`GET /sensors/history/{metric}?limit=N`).
    async fn history(&self, metric: MetricKind, limit: usize) -> Result<Vec<Value>>;

    /// Opaque system analysis (`GET /sensors/status/analysis`).
    async fn analysis(&self) -> Result<SystemAnalysis>;

    // --- Reports ---

    /// Daily or monthly rollup (`GET /reports/summary/{period}`).
    async fn summary(&self, query: SummaryQuery) -> Result<SummaryRecord>;

    /// Per-record table for one day (`GET /reports/table/daily`).
    async fn daily_table(&self, date: Option<Date>) -> Result<Vec<DailyTableRow>>;

    /// Per-day table for one month (`GET /reports/table/monthly`).
    async fn monthly_table(&self, month: u8, year: i32) -> Result<Vec<MonthlyTableRow>>;

    // --- Control ---

    /// Send an actuator command (`POST /control/{device}/{action}`).
    ///
    /// A returned ack may still report a refusal; see [`CommandAck::is_success`].
    async fn control(&self, device: &DeviceId, action: DeviceAction) -> Result<CommandAck>;

    // --- Account ---

    /// Exchange credentials for a token (`POST /auth/login`, form-encoded).
    /// Does not touch the session.
    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant>;

    /// Profile of the signed-in user (`GET /users/me`).
    async fn me(&self) -> Result<UserProfile>;

    /// Server-side token invalidation (`POST /auth/logout`).
    async fn logout(&self) -> Result<()>;

    // --- User administration ---

    async fn list_users(&self, search: Option<&str>, limit: usize) -> Result<Vec<UserProfile>>;

    async fn register_user(&self, user: &NewUser) -> Result<Value>;

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<Value>;

    async fn delete_user(&self, id: &str) -> Result<()>;

    async fn reset_password(&self, id: &str, new_password: &str) -> Result<()>;
}

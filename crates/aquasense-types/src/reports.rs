//! Summary, report-table and user-account records.
//!
//! Summary records are kept opaque: daily and monthly rollups have unrelated
//! schemas, so the raw body is stored and typed views are offered per period.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Rollup period of a summary or report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPeriod {
    Daily,
    Monthly,
}

impl SummaryPeriod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPeriod::Daily => "daily",
            SummaryPeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryPeriod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "today" => Ok(SummaryPeriod::Daily),
            "monthly" | "month" => Ok(SummaryPeriod::Monthly),
            other => Err(ParseError::InvalidData(format!(
                "unknown summary period '{other}'"
            ))),
        }
    }
}

/// A summary as returned by `/reports/summary/{period}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub period: SummaryPeriod,
    /// Raw response body.
    pub body: Value,
}

impl SummaryRecord {
    #[must_use]
    pub fn new(period: SummaryPeriod, body: Value) -> Self {
        Self { period, body }
    }

    /// Typed view of a daily summary. `None` for monthly records or when the
    /// body has no statistics (the backend sends `{"message": ...}` while it
    /// is still waiting for data).
    #[must_use]
    pub fn daily(&self) -> Option<DailySummary> {
        if self.period != SummaryPeriod::Daily || self.body.get("statistics").is_none() {
            return None;
        }
        serde_json::from_value(self.body.clone()).ok()
    }

    /// Typed view of a monthly summary.
    #[must_use]
    pub fn monthly(&self) -> Option<MonthlySummary> {
        if self.period != SummaryPeriod::Monthly || self.body.get("grade").is_none() {
            return None;
        }
        serde_json::from_value(self.body.clone()).ok()
    }

    /// Free-text notice the backend sends in place of statistics.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// Statistics block of a daily summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyStatistics {
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub warning: u32,
    #[serde(default)]
    pub avg_ph: Option<f64>,
    #[serde(default)]
    pub max_nh3: Option<f64>,
    #[serde(default)]
    pub avg_turbidity: Option<f64>,
    #[serde(default)]
    pub avg_temp: Option<f64>,
    #[serde(default)]
    pub avg_tds: Option<f64>,
}

/// Today's rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary_text: String,
    pub statistics: DailyStatistics,
}

/// Month rollup with a quality grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    #[serde(default)]
    pub period: String,
    pub grade: String,
    #[serde(default)]
    pub total_logs: u64,
    #[serde(default)]
    pub critical_count: u64,
}

/// Row of `/reports/table/daily`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyTableRow {
    pub time: String,
    pub status: String,
    pub ph: String,
    pub temp: String,
    pub nh3: String,
    pub turbidity: String,
    pub issues: String,
}

/// Row of `/reports/table/monthly`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyTableRow {
    pub date: String,
    pub status: String,
    pub avg_ph: String,
    pub avg_temp: String,
    pub max_nh3: String,
    pub avg_turbidity: String,
    pub note: String,
}

/// Pull a list out of a response that may be a bare array or wrapped as
/// `{"data": [...]}` / `{"items": [...]}`. Anything else is an empty list;
/// elements that do not match `T` are skipped.
#[must_use]
pub fn unwrap_list<T: serde::de::DeserializeOwned>(body: Value) -> Vec<T> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("items")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(ParseError::InvalidData(format!("unknown role '{other}'"))),
        }
    }
}

/// Signed-in user profile as returned by `/users/me` and the user list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Registration form for a new account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub role: Role,
}

/// Partial update of an account. Unset fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.is_active.is_none()
    }
}

//! Core types for water-quality telemetry.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};
use crate::timestamp::BackendTime;

/// One sensor channel of the installation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new channels
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum MetricKind {
    /// Water temperature in degrees Celsius.
    #[serde(rename = "temperature")]
    Temperature,
    /// Acidity (pH, dimensionless).
    #[serde(rename = "ph")]
    Ph,
    /// Turbidity in NTU.
    #[serde(rename = "turbidity")]
    Turbidity,
    /// Ammonia (NH3) concentration in ppm.
    #[serde(rename = "nh3")]
    Ammonia,
    /// Total dissolved solids in ppm.
    #[serde(rename = "tds")]
    DissolvedSolids,
}

/// Static description of a metric as the backend and gauges see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSpec {
    pub kind: MetricKind,
    /// Path segment used in `/sensors/latest/{segment}` and `/sensors/history/{segment}`.
    pub segment: &'static str,
    /// Key holding the value in backend records.
    pub field_key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    /// Upper end of the gauge sweep.
    pub gauge_max: f64,
}

/// Metric lookup table. The backend names the value field differently per
/// metric; everything past the HTTP boundary goes through this table.
pub const METRICS: [MetricSpec; 5] = [
    MetricSpec {
        kind: MetricKind::Temperature,
        segment: "temperature",
        field_key: "temperature",
        label: "Temperature",
        unit: "°C",
        gauge_max: 50.0,
    },
    MetricSpec {
        kind: MetricKind::Ph,
        segment: "ph",
        field_key: "ph",
        label: "pH Level",
        unit: "",
        gauge_max: 20.0,
    },
    MetricSpec {
        kind: MetricKind::Turbidity,
        segment: "turbidity",
        field_key: "NTU",
        label: "Turbidity",
        unit: "NTU",
        gauge_max: 100.0,
    },
    MetricSpec {
        kind: MetricKind::Ammonia,
        segment: "nh3",
        field_key: "NH3",
        label: "Ammonia (NH3)",
        unit: "ppm",
        gauge_max: 1.0,
    },
    MetricSpec {
        kind: MetricKind::DissolvedSolids,
        segment: "tds",
        field_key: "tds",
        label: "TDS",
        unit: "ppm",
        gauge_max: 1000.0,
    },
];

impl MetricKind {
    /// All metrics in dashboard order.
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Temperature,
        MetricKind::Ph,
        MetricKind::Turbidity,
        MetricKind::Ammonia,
        MetricKind::DissolvedSolids,
    ];

    /// The lookup-table entry for this metric.
    #[must_use]
    pub fn spec(&self) -> &'static MetricSpec {
        let index = match self {
            MetricKind::Temperature => 0,
            MetricKind::Ph => 1,
            MetricKind::Turbidity => 2,
            MetricKind::Ammonia => 3,
            MetricKind::DissolvedSolids => 4,
        };
        &METRICS[index]
    }

    /// URL path segment for this metric.
    #[must_use]
    pub fn segment(&self) -> &'static str {
        self.spec().segment
    }

    /// Backend record key holding this metric's value.
    ///
    /// ```
    /// use aquasense_types::MetricKind;
    ///
    /// assert_eq!(MetricKind::Turbidity.field_key(), "NTU");
    /// assert_eq!(MetricKind::Ammonia.field_key(), "NH3");
    /// assert_eq!(MetricKind::Ph.field_key(), "ph");
    /// ```
    #[must_use]
    pub fn field_key(&self) -> &'static str {
        self.spec().field_key
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    #[must_use]
    pub fn unit(&self) -> &'static str {
        self.spec().unit
    }

    /// Upper end of the gauge sweep for this metric.
    #[must_use]
    pub fn gauge_max(&self) -> f64 {
        self.spec().gauge_max
    }

    /// Extract this metric's value from a backend record.
    ///
    /// Returns `None` when the field is absent, `null`, or not a number.
    #[must_use]
    pub fn extract(&self, record: &Value) -> Option<f64> {
        record.get(self.field_key()).and_then(Value::as_f64)
    }

    /// Format a value with this metric's unit, e.g. `"24.50 °C"`.
    #[must_use]
    pub fn format_value(&self, value: f64) -> String {
        let unit = self.unit();
        let precision = if matches!(self, MetricKind::Ammonia) { 3 } else { 2 };
        if unit.is_empty() {
            format!("{value:.precision$}")
        } else {
            format!("{value:.precision$} {unit}")
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for MetricKind {
    type Err = ParseError;

    /// Parse a metric from its path segment or a common alias.
    ///
    /// ```
    /// use aquasense_types::MetricKind;
    ///
    /// assert_eq!("nh3".parse::<MetricKind>(), Ok(MetricKind::Ammonia));
    /// assert_eq!("Ammonia".parse::<MetricKind>(), Ok(MetricKind::Ammonia));
    /// assert_eq!("dissolved-solids".parse::<MetricKind>(), Ok(MetricKind::DissolvedSolids));
    /// assert!("co2".parse::<MetricKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(MetricKind::Temperature),
            "ph" => Ok(MetricKind::Ph),
            "turbidity" | "ntu" => Ok(MetricKind::Turbidity),
            "nh3" | "ammonia" => Ok(MetricKind::Ammonia),
            "tds" | "dissolved-solids" | "dissolved_solids" | "dissolvedsolids" => {
                Ok(MetricKind::DissolvedSolids)
            }
            other => Err(ParseError::UnknownMetric(other.to_string())),
        }
    }
}

/// Latest value of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub metric: MetricKind,
    pub value: f64,
    /// When the backend recorded the value. `None` for the placeholder
    /// used before a metric has ever been fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<BackendTime>,
}

impl Reading {
    /// Zero reading used when a metric has never been fetched successfully.
    #[must_use]
    pub fn placeholder(metric: MetricKind) -> Self {
        Self {
            metric,
            value: 0.0,
            timestamp: None,
        }
    }

    /// Build a reading from a `/sensors/latest/{metric}` record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingField`] if the metric-specific field is
    /// missing or not numeric. An unparseable timestamp is dropped rather
    /// than failing the reading.
    pub fn from_record(metric: MetricKind, record: &Value) -> ParseResult<Self> {
        let value = metric.extract(record).ok_or(ParseError::MissingField {
            field: metric.field_key(),
        })?;
        let timestamp = record
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| BackendTime::parse(s).ok());
        Ok(Self {
            metric,
            value,
            timestamp,
        })
    }

    /// Whether this is the never-fetched placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.timestamp.is_none() && self.value == 0.0
    }
}

/// Opaque "system analysis" status returned by `/sensors/status/analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAnalysis {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any further fields the backend chose to include.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl SystemAnalysis {
    /// `true` when the backend reports a `normal` or `good` status.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("normal") || self.status.eq_ignore_ascii_case("good")
    }

    /// One-line summary: the message if present, otherwise the whole record as JSON.
    #[must_use]
    pub fn summary_line(&self) -> String {
        match &self.message {
            Some(message) if !message.is_empty() => message.clone(),
            _ => serde_json::to_string(self).unwrap_or_else(|_| self.status.clone()),
        }
    }
}

/// Merged latest-reading state across all metrics at one instant.
///
/// A snapshot is replaced wholesale by each poll cycle and never edited in
/// place, so readers always see values from a single cycle (plus values
/// carried forward from earlier cycles for metrics that failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Poll-cycle generation that produced this snapshot (0 = initial).
    pub generation: u64,
    pub readings: BTreeMap<MetricKind, Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<SystemAnalysis>,
    pub connected: bool,
    /// When the producing cycle settled.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub refreshed_at: Option<OffsetDateTime>,
}

impl Snapshot {
    /// The snapshot live before any cycle has completed: every metric at its
    /// placeholder value and `connected == false`.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            generation: 0,
            readings: MetricKind::ALL
                .iter()
                .map(|m| (*m, Reading::placeholder(*m)))
                .collect(),
            analysis: None,
            connected: false,
            refreshed_at: None,
        }
    }

    /// Reading for `metric`, falling back to its placeholder.
    #[must_use]
    pub fn reading(&self, metric: MetricKind) -> Reading {
        self.readings
            .get(&metric)
            .copied()
            .unwrap_or_else(|| Reading::placeholder(metric))
    }

    /// Scalar value for `metric`.
    #[must_use]
    pub fn value(&self, metric: MetricKind) -> f64 {
        self.reading(metric).value
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// One chart-ready point of a history series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Locale time label (`HH:MM`).
    pub display_time: String,
    /// Metric value, `None` when the backend record lacked the field.
    pub value: Option<f64>,
    /// Instant the record was taken, at the display offset.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

//! Platform-agnostic types for the AquaSense water-quality console.
//!
//! This crate provides the shared data model used by the telemetry core
//! (aquasense-core) and the terminal console (aquasense-cli).
//!
//! # Features
//!
//! - Metric catalogue with the metric→backend-field lookup table
//! - Readings, merged snapshots and chart-ready history points
//! - Actuator identifiers, commands and local on/off state
//! - Summary, report-table and user-account records
//! - Backend timestamp parsing (zoned and naive)
//!
//! # Example
//!
//! ```
//! use aquasense_types::{MetricKind, Reading};
//! use serde_json::json;
//!
//! let record = json!({"NTU": 4.2, "timestamp": "2024-05-01T10:00:00"});
//! let reading = Reading::from_record(MetricKind::Turbidity, &record).unwrap();
//! assert_eq!(reading.value, 4.2);
//! ```

pub mod device;
pub mod error;
pub mod reports;
pub mod timestamp;
pub mod types;

pub use device::{CommandAck, DeviceAction, DeviceId, DeviceState, KNOWN_DEVICES};
pub use error::{ParseError, ParseResult};
pub use reports::{
    DailyStatistics, DailySummary, DailyTableRow, MonthlySummary, MonthlyTableRow, NewUser, Role,
    SummaryPeriod, SummaryRecord, UserPatch, UserProfile, unwrap_list,
};
pub use timestamp::BackendTime;
pub use types::{HistoryPoint, METRICS, MetricKind, MetricSpec, Reading, Snapshot, SystemAnalysis};

//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::builder::Builder;
use time::format_description::well_known::Rfc3339;

use aquasense_core::GaugeFrame;
use aquasense_core::gauge::zone_for;
use aquasense_types::{
    DailyTableRow, HistoryPoint, MetricKind, MonthlyTableRow, Snapshot, SummaryRecord, UserProfile,
};

use crate::cli::StyleMode;
use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
    /// Visual styling mode.
    pub style: StyleMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            no_header: false,
            compact: false,
            style: StyleMode::Rich,
        }
    }
}

impl FormatOptions {
    pub fn new(no_color: bool, style: StyleMode) -> Self {
        // Plain mode automatically disables colors for pipe-friendliness
        Self {
            no_color: no_color || style == StyleMode::Plain,
            no_header: false,
            compact: false,
            style,
        }
    }

    pub fn is_plain(&self) -> bool {
        self.style == StyleMode::Plain
    }

    /// Create with no_header option for CSV output.
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    /// Value with unit; plain mode drops the degree sign.
    fn value(&self, metric: MetricKind, value: f64) -> String {
        let text = metric.format_value(value);
        if self.is_plain() {
            text.replace('°', "")
        } else {
            text
        }
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        style::apply_table_style(&mut table, self.style);
        let mut out = table.to_string();
        out.push('\n');
        out
    }
}

/// Escape a string for CSV output.
/// Wraps the value in quotes if it contains commas, quotes, or newlines.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn rfc3339(t: Option<time::OffsetDateTime>) -> String {
    t.and_then(|t| t.format(&Rfc3339).ok()).unwrap_or_default()
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

// ============================================================================
// Snapshot formatting
// ============================================================================

/// Full snapshot as a table, one row per metric.
pub fn format_snapshot_text(snapshot: &Snapshot, opts: &FormatOptions) -> String {
    let mut output = format!(
        "{} cycle {}\n",
        style::format_connected(snapshot.connected, opts.no_color),
        snapshot.generation
    );

    let mut builder = Builder::default();
    builder.push_record(["Metric", "Value", "Zone", "Recorded"]);
    for metric in MetricKind::ALL {
        let reading = snapshot.reading(metric);
        let zone = zone_for(metric, reading.value);
        let value = opts.value(metric, reading.value);
        builder.push_record([
            metric.label().to_string(),
            style::paint(&value, zone.colour(), opts.no_color),
            style::format_zone(zone, opts.no_color),
            reading
                .timestamp
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    output.push_str(&opts.table(builder));

    if let Some(analysis) = &snapshot.analysis {
        output.push_str(&format!(
            "Status: {}\n",
            style::format_status_text(&analysis.summary_line(), opts.no_color)
        ));
    }
    output
}

/// Compact one-line snapshot for watch mode.
pub fn format_snapshot_line(snapshot: &Snapshot, opts: &FormatOptions) -> String {
    let time = snapshot
        .refreshed_at
        .map(|t| format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()))
        .unwrap_or_else(|| "--:--:--".to_string());

    let values: Vec<String> = MetricKind::ALL
        .iter()
        .map(|metric| {
            let value = snapshot.value(*metric);
            let text = opts.value(*metric, value);
            format!(
                "{}: {}",
                metric.segment(),
                style::paint(&text, zone_for(*metric, value).colour(), opts.no_color)
            )
        })
        .collect();

    let mut line = format!("[{}] {}", time, values.join("  "));
    if !snapshot.connected {
        let note = " (partial)";
        if opts.no_color {
            line.push_str(note);
        } else {
            line.push_str(&format!("{}", note.yellow()));
        }
    }
    line.push('\n');
    line
}

#[must_use]
pub fn format_snapshot_csv_header(opts: &FormatOptions) -> String {
    if opts.no_header {
        return String::new();
    }
    let columns: Vec<&str> = MetricKind::ALL.iter().map(|m| m.segment()).collect();
    format!("refreshed_at,generation,connected,{}\n", columns.join(","))
}

#[must_use]
pub fn format_snapshot_csv_line(snapshot: &Snapshot) -> String {
    let values: Vec<String> = MetricKind::ALL
        .iter()
        .map(|m| snapshot.value(*m).to_string())
        .collect();
    format!(
        "{},{},{},{}\n",
        rfc3339(snapshot.refreshed_at),
        snapshot.generation,
        snapshot.connected,
        values.join(",")
    )
}

// ============================================================================
// Gauge formatting
// ============================================================================

/// Gauges as arc bars with the animated value and needle angle.
pub fn format_gauges(frames: &[GaugeFrame], opts: &FormatOptions) -> String {
    let width = (style::terminal_width().saturating_sub(48)).clamp(10, 40);
    let mut output = String::new();
    for frame in frames {
        let value = opts.value(frame.metric, frame.display_value);
        output.push_str(&format!(
            "{:<14} {} {:>12} {:>6.1}° {}\n",
            frame.metric.label(),
            style::format_arc_bar(&frame.arc, width, opts.no_color),
            value,
            frame.needle.angle_degrees,
            style::format_zone(frame.arc.zone, opts.no_color),
        ));
    }
    output
}

// ============================================================================
// History formatting
// ============================================================================

pub fn format_history_text(metric: MetricKind, points: &[HistoryPoint], opts: &FormatOptions) -> String {
    if points.is_empty() {
        return format!("No history records found for {}.\n", metric.label());
    }

    let mut output = format!("{} history ({} records):\n\n", metric.label(), points.len());
    let mut builder = Builder::default();
    builder.push_record(["Time", "Value", "Zone"]);
    for point in points {
        let (value, zone) = match point.value {
            Some(v) => {
                let zone = zone_for(metric, v);
                (
                    style::paint(&opts.value(metric, v), zone.colour(), opts.no_color),
                    style::format_zone(zone, opts.no_color),
                )
            }
            None => ("-".to_string(), String::new()),
        };
        builder.push_record([point.display_time.clone(), value, zone]);
    }
    output.push_str(&opts.table(builder));
    output
}

#[must_use]
pub fn format_history_csv(metric: MetricKind, points: &[HistoryPoint], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        format!("recorded_at,time,{}\n", metric.segment())
    };
    for point in points {
        output.push_str(&format!(
            "{},{},{}\n",
            rfc3339(Some(point.recorded_at)),
            point.display_time,
            point.value.map(|v| v.to_string()).unwrap_or_default()
        ));
    }
    output
}

pub fn format_history_json(metric: MetricKind, points: &[HistoryPoint], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct HistoryJson<'a> {
        metric: MetricKind,
        unit: &'static str,
        count: usize,
        points: &'a [HistoryPoint],
    }

    opts.as_json(&HistoryJson {
        metric,
        unit: metric.unit(),
        count: points.len(),
        points,
    })
}

// ============================================================================
// Summary formatting
// ============================================================================

fn avg(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_summary_text(record: &SummaryRecord, opts: &FormatOptions) -> String {
    if let Some(daily) = record.daily() {
        let stats = &daily.statistics;
        let mut output = style::format_title(&format!("Daily summary {}", daily.date), opts.no_color);
        output.push('\n');
        if !daily.summary_text.is_empty() {
            output.push_str(&daily.summary_text);
            output.push('\n');
        }
        output.push_str(&format!(
            "Critical: {}  Warning: {}\n",
            stats.critical, stats.warning
        ));
        output.push_str(&format!(
            "Avg pH: {}  Avg temp: {}  Max NH3: {}  Avg turbidity: {}  Avg TDS: {}\n",
            avg(stats.avg_ph, 2),
            avg(stats.avg_temp, 1),
            avg(stats.max_nh3, 3),
            avg(stats.avg_turbidity, 1),
            avg(stats.avg_tds, 0),
        ));
        return output;
    }

    if let Some(monthly) = record.monthly() {
        let mut output = style::format_title(&format!("Monthly summary {}", monthly.period), opts.no_color);
        output.push('\n');
        let grade = if opts.no_color {
            monthly.grade.clone()
        } else {
            format!("{}", monthly.grade.bold())
        };
        output.push_str(&format!(
            "Grade: {}  Logs: {}  Critical: {}\n",
            grade, monthly.total_logs, monthly.critical_count
        ));
        return output;
    }

    match record.notice() {
        Some(notice) => format!("{}\n", style::format_warning(notice, opts.no_color)),
        None => format!("No {} summary available.\n", record.period),
    }
}

// ============================================================================
// Report table formatting
// ============================================================================

pub fn format_daily_table_text(rows: &[DailyTableRow], opts: &FormatOptions) -> String {
    if rows.is_empty() {
        return "No records for this day.\n".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(["Time", "Status", "pH", "Temp", "NH3", "Turbidity", "Issues"]);
    for row in rows {
        builder.push_record([
            row.time.clone(),
            style::format_status_text(or_dash(&row.status), opts.no_color),
            or_dash(&row.ph).to_string(),
            or_dash(&row.temp).to_string(),
            or_dash(&row.nh3).to_string(),
            or_dash(&row.turbidity).to_string(),
            or_dash(&row.issues).to_string(),
        ]);
    }
    opts.table(builder)
}

#[must_use]
pub fn format_daily_table_csv(rows: &[DailyTableRow], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "time,status,ph,temp,nh3,turbidity,issues\n".to_string()
    };
    for row in rows {
        let fields = [
            &row.time,
            &row.status,
            &row.ph,
            &row.temp,
            &row.nh3,
            &row.turbidity,
            &row.issues,
        ];
        let escaped: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        output.push_str(&escaped.join(","));
        output.push('\n');
    }
    output
}

pub fn format_monthly_table_text(rows: &[MonthlyTableRow], opts: &FormatOptions) -> String {
    if rows.is_empty() {
        return "No records for this month.\n".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(["Date", "Status", "Avg pH", "Avg temp", "Max NH3", "Avg turbidity", "Note"]);
    for row in rows {
        builder.push_record([
            row.date.clone(),
            style::format_status_text(or_dash(&row.status), opts.no_color),
            or_dash(&row.avg_ph).to_string(),
            or_dash(&row.avg_temp).to_string(),
            or_dash(&row.max_nh3).to_string(),
            or_dash(&row.avg_turbidity).to_string(),
            or_dash(&row.note).to_string(),
        ]);
    }
    opts.table(builder)
}

#[must_use]
pub fn format_monthly_table_csv(rows: &[MonthlyTableRow], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "date,status,avg_ph,avg_temp,max_nh3,avg_turbidity,note\n".to_string()
    };
    for row in rows {
        let fields = [
            &row.date,
            &row.status,
            &row.avg_ph,
            &row.avg_temp,
            &row.max_nh3,
            &row.avg_turbidity,
            &row.note,
        ];
        let escaped: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        output.push_str(&escaped.join(","));
        output.push('\n');
    }
    output
}

// ============================================================================
// Account formatting
// ============================================================================

pub fn format_profile_text(user: &UserProfile, opts: &FormatOptions) -> String {
    let name = if opts.no_color {
        user.username.clone()
    } else {
        format!("{}", user.username.cyan())
    };
    let mut output = format!("Signed in as {}", name);
    if let Some(role) = &user.role {
        output.push_str(&format!(" ({})", role));
    }
    output.push('\n');
    if let Some(display) = &user.name {
        output.push_str(&format!("Name:  {}\n", display));
    }
    if let Some(email) = &user.email {
        output.push_str(&format!("Email: {}\n", email));
    }
    output
}

pub fn format_users_text(users: &[UserProfile], opts: &FormatOptions) -> String {
    if users.is_empty() {
        return "No users found.\n".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(["ID", "Username", "Name", "Email", "Role", "Active"]);
    for user in users {
        let active = match user.is_active {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        builder.push_record([
            user.id.as_deref().unwrap_or("-"),
            user.username.as_str(),
            user.name.as_deref().unwrap_or("-"),
            user.email.as_deref().unwrap_or("-"),
            user.role.as_deref().unwrap_or("-"),
            active,
        ]);
    }
    let mut output = format!("{} user(s):\n", users.len());
    output.push_str(&opts.table(builder));
    output
}

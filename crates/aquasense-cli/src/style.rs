//! Visual styling utilities for the CLI.
//!
//! Spinners, gauge zone colours and table styling shared by every command.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use aquasense_core::gauge::{GaugeArc, GaugeZone, Rgb, TRACK_COLOUR};
use aquasense_types::CommandAck;

use crate::cli::StyleMode;

// ============================================================================
// Progress Indicators
// ============================================================================

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner for a request in flight.
pub fn request_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

// ============================================================================
// Gauge colours
// ============================================================================

/// Paint `text` in a gauge colour.
pub fn paint(text: &str, colour: Rgb, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("{}", text.truecolor(colour.0, colour.1, colour.2))
    }
}

/// Zone label, coloured like the gauge arc.
/// Metrics without zones give an empty string.
pub fn format_zone(zone: GaugeZone, no_color: bool) -> String {
    if zone.label().is_empty() {
        return String::new();
    }
    paint(&format!("[{}]", zone.label()), zone.colour(), no_color)
}

/// Horizontal bar mirroring a gauge arc: filled part in the zone colour,
/// remainder in the track colour.
pub fn format_arc_bar(arc: &GaugeArc, width: usize, no_color: bool) -> String {
    let filled = ((arc.filled_fraction * width as f64).round() as usize).min(width);
    let (full, empty) = if no_color { ("#", ".") } else { ("█", "░") };
    format!(
        "{}{}",
        paint(&full.repeat(filled), arc.colour, no_color),
        paint(&empty.repeat(width - filled), TRACK_COLOUR, no_color)
    )
}

/// Connectivity badge.
pub fn format_connected(connected: bool, no_color: bool) -> String {
    match (connected, no_color) {
        (true, true) => "[ONLINE]".to_string(),
        (false, true) => "[OFFLINE]".to_string(),
        (true, false) => format!("[{}]", "ONLINE".green()),
        (false, false) => format!("[{}]", "OFFLINE".red()),
    }
}

/// Status string from the backend, coloured by severity keyword.
pub fn format_status_text(status: &str, no_color: bool) -> String {
    if no_color {
        return status.to_string();
    }
    let lower = status.to_ascii_lowercase();
    if lower.contains("critical") || lower.contains("danger") || lower.contains("bad") {
        format!("{}", status.red())
    } else if lower.contains("warn") {
        format!("{}", status.yellow())
    } else if lower.contains("normal") || lower.contains("good") || lower.contains("safe") {
        format!("{}", status.green())
    } else {
        status.to_string()
    }
}

/// One-line outcome of a control command.
pub fn format_ack(ack: &CommandAck, no_color: bool) -> String {
    let message = if ack.message.is_empty() {
        &ack.status
    } else {
        &ack.message
    };
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

// ============================================================================
// Headers and messages
// ============================================================================

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    let rule = "━".repeat(title.chars().count());
    if no_color {
        format!("{}\n{}", title, rule)
    } else {
        format!("{}\n{}", title.bold(), rule.dimmed())
    }
}

pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Get terminal width, defaulting to 80 if detection fails.
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Apply table style based on StyleMode.
pub fn apply_table_style(table: &mut tabled::Table, style: StyleMode) {
    use tabled::settings::Style;
    match style {
        StyleMode::Rich => {
            table.with(Style::rounded());
        }
        StyleMode::Plain => {
            table.with(Style::blank());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquasense_core::gauge::arc;
    use aquasense_types::MetricKind;

    #[test]
    fn test_arc_bar_no_color() {
        let half = arc(MetricKind::Ph, 10.0);
        assert_eq!(format_arc_bar(&half, 10, true), "#####.....");

        let empty = arc(MetricKind::Ph, -3.0);
        assert_eq!(format_arc_bar(&empty, 4, true), "....");

        let full = arc(MetricKind::Ph, 99.0);
        assert_eq!(format_arc_bar(&full, 4, true), "####");
    }

    #[test]
    fn test_zone_label_plain() {
        assert_eq!(format_zone(GaugeZone::Optimal, true), "[optimal]");
        assert_eq!(format_zone(GaugeZone::Accent, true), "");
    }

    #[test]
    fn test_paint_with_color_keeps_text() {
        let painted = paint("7.00", Rgb(0, 0xab, 0), false);
        assert!(painted.contains("7.00"));
        assert_ne!(painted, "7.00");
    }

    #[test]
    fn test_connected_badge() {
        assert_eq!(format_connected(true, true), "[ONLINE]");
        assert_eq!(format_connected(false, true), "[OFFLINE]");
    }

    #[test]
    fn test_status_text_plain_passthrough() {
        assert_eq!(format_status_text("Critical", true), "Critical");
        assert!(format_status_text("Warning", false).contains("Warning"));
    }

    #[test]
    fn test_title_underline_matches_length() {
        let title = format_title("Daily report", true);
        let lines: Vec<&str> = title.lines().collect();
        assert_eq!(lines[1].chars().count(), "Daily report".len());
    }
}

//! Half-donut gauge geometry.
//!
//! A value is mapped linearly onto a sweep from 180° (zero) to 0° (the
//! gauge maximum). Screen coordinates have `y` growing downwards, so the
//! needle angle is negated before taking `sin`/`cos`.
//!
//! Out-of-range values are not clamped: a value above the maximum gives a
//! needle past the right end of the sweep, a negative one past the left.
//!
//! # Example
//!
//! ```
//! use aquasense_core::gauge::{GaugeGeometry, compute_needle};
//!
//! let needle = compute_needle(10.0, 20.0, &GaugeGeometry::default());
//! assert!((needle.angle_degrees - 90.0).abs() < 1e-9);
//! // Pointing straight up from the hub.
//! assert!((needle.tip.x - needle.hub.x).abs() < 1e-9);
//! assert!(needle.tip.y < needle.hub.y);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use aquasense_types::MetricKind;

/// Degrees to radians.
const RADIAN: f64 = std::f64::consts::PI / 180.0;

/// A point in gauge (SVG) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// Placement and size of a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeGeometry {
    /// Centre of the arc.
    pub cx: f64,
    pub cy: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    /// Offset of the needle hub from the arc centre, on both axes.
    pub pivot_offset: f64,
    /// Radius of the hub circle, also half the needle base width.
    pub hub_radius: f64,
}

impl Default for GaugeGeometry {
    fn default() -> Self {
        Self {
            cx: 150.0,
            cy: 200.0,
            inner_radius: 50.0,
            outer_radius: 100.0,
            pivot_offset: 5.0,
            hub_radius: 5.0,
        }
    }
}

impl GaugeGeometry {
    /// Needle length: a third of the way from the outer edge to the inner.
    pub fn needle_length(&self) -> f64 {
        (self.inner_radius + 2.0 * self.outer_radius) / 3.0
    }

    pub fn hub(&self) -> Point {
        Point {
            x: self.cx + self.pivot_offset,
            y: self.cy + self.pivot_offset,
        }
    }
}

/// Needle triangle plus hub circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needle {
    pub hub: Point,
    pub hub_radius: f64,
    pub base_a: Point,
    pub base_b: Point,
    pub tip: Point,
    /// 180 at zero, 0 at the gauge maximum.
    pub angle_degrees: f64,
    pub angle_radians: f64,
}

impl Needle {
    /// Closed SVG path of the needle triangle.
    pub fn svg_path(&self) -> String {
        format!(
            "M{} L{} L{} L{}",
            self.base_a, self.base_b, self.tip, self.base_a
        )
    }
}

/// Needle for `value` on a gauge whose full sweep is `domain_max`.
///
/// A non-positive or non-finite `domain_max` is treated as an empty domain
/// and yields the zero position.
pub fn compute_needle(value: f64, domain_max: f64, geometry: &GaugeGeometry) -> Needle {
    let angle_degrees = 180.0 - sweep_fraction(value, domain_max) * 180.0;
    let angle_radians = angle_degrees * RADIAN;
    let length = geometry.needle_length();
    let sin = (-RADIAN * angle_degrees).sin();
    let cos = (-RADIAN * angle_degrees).cos();
    let hub = geometry.hub();
    let r = geometry.hub_radius;

    Needle {
        hub,
        hub_radius: r,
        base_a: Point {
            x: hub.x + r * sin,
            y: hub.y - r * cos,
        },
        base_b: Point {
            x: hub.x - r * sin,
            y: hub.y + r * cos,
        },
        tip: Point {
            x: hub.x + length * cos,
            y: hub.y + length * sin,
        },
        angle_degrees,
        angle_radians,
    }
}

fn sweep_fraction(value: f64, domain_max: f64) -> f64 {
    if domain_max.is_finite() && domain_max > 0.0 {
        value / domain_max
    } else {
        0.0
    }
}

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `#rrggbb`.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Colour of the unfilled part of the arc.
pub const TRACK_COLOUR: Rgb = Rgb(0xdd, 0xdd, 0xdd);

/// Colour band a reading falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaugeZone {
    /// pH below 4.
    Acidic,
    /// pH 4 to 6.5.
    SlightlyAcidic,
    /// pH 6.5 to 9.
    Optimal,
    /// pH 9 to 11.
    Alkaline,
    /// pH above 11.
    StronglyAlkaline,
    /// Metrics without zones.
    Accent,
}

impl GaugeZone {
    pub fn colour(&self) -> Rgb {
        match self {
            GaugeZone::Acidic => Rgb(0xff, 0x4d, 0x4d),
            GaugeZone::SlightlyAcidic => Rgb(0xc4, 0xda, 0x02),
            GaugeZone::Optimal => Rgb(0x00, 0xab, 0x00),
            GaugeZone::Alkaline => Rgb(0x33, 0x99, 0xff),
            GaugeZone::StronglyAlkaline => Rgb(0x02, 0x4d, 0x99),
            GaugeZone::Accent => Rgb(0x95, 0xff, 0x00),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GaugeZone::Acidic => "acidic",
            GaugeZone::SlightlyAcidic => "slightly acidic",
            GaugeZone::Optimal => "optimal",
            GaugeZone::Alkaline => "alkaline",
            GaugeZone::StronglyAlkaline => "strongly alkaline",
            GaugeZone::Accent => "",
        }
    }
}

/// Zone of `value` for `metric`. Bands are closed below and open above.
pub fn zone_for(metric: MetricKind, value: f64) -> GaugeZone {
    match metric {
        MetricKind::Ph => match value {
            v if v < 4.0 => GaugeZone::Acidic,
            v if v < 6.5 => GaugeZone::SlightlyAcidic,
            v if v < 9.0 => GaugeZone::Optimal,
            v if v <= 11.0 => GaugeZone::Alkaline,
            _ => GaugeZone::StronglyAlkaline,
        },
        _ => GaugeZone::Accent,
    }
}

/// The two arc segments of a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeArc {
    /// Share of the sweep drawn in `colour`, within 0..=1.
    pub filled_fraction: f64,
    /// Share drawn in [`TRACK_COLOUR`]; the two always sum to 1.
    pub remaining_fraction: f64,
    pub colour: Rgb,
    pub zone: GaugeZone,
}

/// Arc segments for `value` of `metric`. Unlike the needle, the arc is
/// clamped to the sweep since a segment cannot have negative size.
pub fn arc(metric: MetricKind, value: f64) -> GaugeArc {
    let filled = sweep_fraction(value, metric.gauge_max());
    let filled = if filled.is_nan() { 0.0 } else { filled.clamp(0.0, 1.0) };
    let zone = zone_for(metric, value);
    GaugeArc {
        filled_fraction: filled,
        remaining_fraction: 1.0 - filled,
        colour: zone.colour(),
        zone,
    }
}

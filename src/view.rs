//! Render-ready records composed from one [`LocationStatus`].

use crate::classify::{
    BusynessTier, DEFAULT_DEVIATION_THRESHOLD, Deviation, classify_busyness,
    classify_deviation_with, deviation_label,
};
use crate::model::{LocationStatus, Sample, Snapshot};
use crate::trend::{TrendLabel, label_trend};
use crate::window::{
    ChartPoint, DEFAULT_OPEN_THRESHOLD, chart_points, extract_active_window_with,
};
use serde::Serialize;

/// Thresholds used when deriving views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewThresholds {
    pub open_threshold: f64,
    pub deviation_threshold: f64,
}

impl Default for ViewThresholds {
    fn default() -> Self {
        Self {
            open_threshold: DEFAULT_OPEN_THRESHOLD,
            deviation_threshold: DEFAULT_DEVIATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationView {
    pub name: String,
    pub is_closed: bool,
    /// Expandable to show the chart.
    pub interactive: bool,
    pub busyness_display: String,
    pub tier: BusynessTier,
    pub tier_color: &'static str,
    pub border_width: u8,
    pub deviation: Deviation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_label: Option<String>,
    pub trend_label: TrendLabel,
    pub chart_window: Vec<Sample>,
    pub chart_points: Vec<ChartPoint>,
}

pub fn build_location_view(status: &LocationStatus) -> LocationView {
    build_location_view_with(status, &ViewThresholds::default())
}

pub fn build_location_view_with(
    status: &LocationStatus,
    thresholds: &ViewThresholds,
) -> LocationView {
    // NaN is no reading at all; infinities still clamp like any other value.
    let current = status.current_busyness.filter(|value| !value.is_nan());
    let is_closed = current.is_none();
    let chart_window = extract_active_window_with(&status.today_window, thresholds.open_threshold);
    let interactive = !is_closed || !chart_window.is_empty();
    let tier = classify_busyness(current);

    let busyness_display = match current {
        Some(value) => format!("{}%", value.clamp(0.0, 100.0).round() as i64),
        None => "Closed".to_string(),
    };
    let badge = if is_closed {
        None
    } else {
        deviation_label(status.vs_typical)
    };

    LocationView {
        name: status.name.clone(),
        is_closed,
        interactive,
        busyness_display,
        tier,
        tier_color: tier.color(),
        border_width: tier.border_width(),
        deviation: classify_deviation_with(status.vs_typical, thresholds.deviation_threshold),
        deviation_label: badge,
        trend_label: label_trend(status.trend),
        chart_points: chart_points(&chart_window),
        chart_window,
    }
}

/// Views for every location, in snapshot order.
pub fn build_dashboard(snapshot: &Snapshot, thresholds: &ViewThresholds) -> Vec<LocationView> {
    snapshot
        .locations()
        .iter()
        .map(|status| build_location_view_with(status, thresholds))
        .collect()
}

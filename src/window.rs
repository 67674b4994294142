//! Opening detection over a location's samples for the current day.
//!
//! Before a location opens its sensor reports a low, flat baseline. The
//! chart starts at the first reading at or above [`DEFAULT_OPEN_THRESHOLD`]
//! and keeps everything after it.

use crate::model::Sample;
use serde::Serialize;

/// Busyness percentage at which a location counts as open.
pub const DEFAULT_OPEN_THRESHOLD: f64 = 5.0;

pub fn extract_active_window(samples: &[Sample]) -> Vec<Sample> {
    extract_active_window_with(samples, DEFAULT_OPEN_THRESHOLD)
}

pub fn extract_active_window_with(samples: &[Sample], open_threshold: f64) -> Vec<Sample> {
    let readings: Vec<&Sample> = samples
        .iter()
        .filter(|sample| sample.busyness_percentage.is_some_and(|value| !value.is_nan()))
        .collect();

    let opening_index = readings.iter().position(|sample| {
        sample
            .busyness_percentage
            .is_some_and(|value| value >= open_threshold)
    });

    match opening_index {
        Some(index) => readings[index..].iter().map(|sample| (*sample).clone()).collect(),
        None => Vec::new(),
    }
}

/// One chart point, labelled with the reading's local clock time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: String,
    pub time_label: String,
    pub busyness: f64,
}

pub fn chart_points(window: &[Sample]) -> Vec<ChartPoint> {
    window
        .iter()
        .filter_map(|sample| {
            let busyness = sample.busyness_percentage?;
            Some(ChartPoint {
                timestamp: sample.timestamp.clone(),
                time_label: time_label(sample),
                busyness,
            })
        })
        .collect()
}

/// `9:05 AM` style label, or `—` when the timestamp does not parse.
fn time_label(sample: &Sample) -> String {
    let Some(local) = sample.local_time() else {
        return "—".to_string();
    };
    let hour = local.hour();
    let period = if hour < 12 { "AM" } else { "PM" };
    let hour12 = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{hour12}:{:02} {period}", local.minute())
}

//! Threshold classification of busyness and deviation-from-typical values.

use serde::Serialize;

/// Deviations within this many percentage points of typical show as typical.
pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 5.0;

/// Visual bucket for a busyness percentage.
///
/// The seven open tiers partition [0, 100] as
/// `[0,20) [20,40) [40,60) [60,70) [70,80) [80,90) [90,100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusynessTier {
    Closed,
    VeryLow,
    Low,
    Moderate,
    ElevatedGreenish,
    ElevatedYellow,
    High,
    VeryHigh,
}

impl BusynessTier {
    /// Color name on the occupancy scale; `muted` for closed.
    pub fn color(self) -> &'static str {
        match self {
            BusynessTier::Closed => "muted",
            BusynessTier::VeryLow => "light_green",
            BusynessTier::Low => "medium_green",
            BusynessTier::Moderate => "dark_green",
            BusynessTier::ElevatedGreenish => "yellow_green",
            BusynessTier::ElevatedYellow => "yellow_orange",
            BusynessTier::High => "orange_red",
            BusynessTier::VeryHigh => "dark_red",
        }
    }

    /// Border weight, heavier as the location gets busier.
    pub fn border_width(self) -> u8 {
        match self {
            BusynessTier::Closed | BusynessTier::VeryLow | BusynessTier::Low => 2,
            BusynessTier::Moderate | BusynessTier::ElevatedGreenish | BusynessTier::ElevatedYellow => 3,
            BusynessTier::High | BusynessTier::VeryHigh => 4,
        }
    }
}

pub fn classify_busyness(value: Option<f64>) -> BusynessTier {
    let Some(value) = value.filter(|value| !value.is_nan()) else {
        return BusynessTier::Closed;
    };

    let clamped = value.clamp(0.0, 100.0);
    if clamped < 20.0 {
        BusynessTier::VeryLow
    } else if clamped < 40.0 {
        BusynessTier::Low
    } else if clamped < 60.0 {
        BusynessTier::Moderate
    } else if clamped < 70.0 {
        BusynessTier::ElevatedGreenish
    } else if clamped < 80.0 {
        BusynessTier::ElevatedYellow
    } else if clamped < 90.0 {
        BusynessTier::High
    } else {
        BusynessTier::VeryHigh
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Deviation {
    Above,
    Typical,
    Below,
    /// No baseline available; no badge is shown.
    Unknown,
}

pub fn classify_deviation(vs_typical: Option<f64>) -> Deviation {
    classify_deviation_with(vs_typical, DEFAULT_DEVIATION_THRESHOLD)
}

/// Dead-zone classification: only deviations strictly beyond `±threshold`
/// count as above or below typical.
pub fn classify_deviation_with(vs_typical: Option<f64>, threshold: f64) -> Deviation {
    match vs_typical {
        None => Deviation::Unknown,
        Some(value) if value.is_nan() => Deviation::Unknown,
        Some(value) if value > threshold => Deviation::Above,
        Some(value) if value < -threshold => Deviation::Below,
        Some(_) => Deviation::Typical,
    }
}

/// Badge text such as `+12% vs typical`, or `None` when there is no baseline.
pub fn deviation_label(vs_typical: Option<f64>) -> Option<String> {
    let value = vs_typical.filter(|value| value.is_finite())?;
    // Halves round up, so -2.5 reads as -2.
    let rounded = (value + 0.5).floor() as i64;
    let sign = if rounded > 0 { "+" } else { "" };
    Some(format!("{sign}{rounded}% vs typical"))
}

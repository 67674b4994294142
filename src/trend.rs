use crate::model::Trend;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendLabel {
    pub glyph: &'static str,
    pub text: &'static str,
}

pub const UNKNOWN_TREND: TrendLabel = TrendLabel {
    glyph: "—",
    text: "Unknown",
};

/// Display glyph and text for a trend; anything unrecognized reads as `Unknown`.
pub fn label_trend(trend: Option<Trend>) -> TrendLabel {
    match trend {
        Some(Trend::Increasing) => TrendLabel {
            glyph: "↗",
            text: "Increasing",
        },
        Some(Trend::Steady) => TrendLabel {
            glyph: "→",
            text: "Steady",
        },
        Some(Trend::Decreasing) => TrendLabel {
            glyph: "↘",
            text: "Decreasing",
        },
        Some(Trend::Unknown) | None => UNKNOWN_TREND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_trends_have_fixed_labels() {
        assert_eq!(
            label_trend(Some(Trend::Increasing)),
            TrendLabel {
                glyph: "↗",
                text: "Increasing"
            }
        );
        assert_eq!(label_trend(Some(Trend::Steady)).glyph, "→");
        assert_eq!(label_trend(Some(Trend::Decreasing)).glyph, "↘");
        assert_eq!(label_trend(Some(Trend::Decreasing)).text, "Decreasing");
    }

    #[test]
    fn absent_or_unrecognized_trend_is_unknown() {
        assert_eq!(label_trend(None), UNKNOWN_TREND);
        assert_eq!(label_trend(Some(Trend::from_wire("Sideways"))), UNKNOWN_TREND);
        assert_eq!(label_trend(None).glyph, "—");
        assert_eq!(label_trend(None).text, "Unknown");
    }
}

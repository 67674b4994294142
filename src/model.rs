//! Data types for per-location busyness readings as delivered by the upstream
//! `/current` endpoint.
//!
//! Decoding is lenient at the field level: an unexpected trend value, a
//! non-numeric percentage or a missing `today_data` list degrade to
//! `Unknown`/`None`/empty instead of failing the whole payload. Only
//! structural problems (body is not an array, a location without a name,
//! duplicate names) are reported as [`FetchError`].

use crate::error::FetchError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// One busyness reading for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ISO-8601 text exactly as received.
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub busyness_percentage: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: impl Into<String>, busyness_percentage: Option<f64>) -> Self {
        Self {
            timestamp: timestamp.into(),
            busyness_percentage,
        }
    }

    /// Wall-clock time of the reading in the zone it was reported in.
    pub fn local_time(&self) -> Option<PrimitiveDateTime> {
        parse_wall_clock(&self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Increasing,
    Steady,
    Decreasing,
    /// Any trend value the upstream sends that is not one of the above.
    Unknown,
}

impl Trend {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Increasing" => Trend::Increasing,
            "Steady" => Trend::Steady,
            "Decreasing" => Trend::Decreasing,
            _ => Trend::Unknown,
        }
    }
}

/// Current state of one location in a snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationStatus {
    #[serde(rename = "location")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub timestamp: Option<String>,
    #[serde(
        rename = "busyness_percentage",
        default,
        deserialize_with = "lenient_number"
    )]
    pub current_busyness: Option<f64>,
    #[serde(
        rename = "vs_typical_percentage",
        default,
        deserialize_with = "lenient_number"
    )]
    pub vs_typical: Option<f64>,
    #[serde(default, deserialize_with = "lenient_trend")]
    pub trend: Option<Trend>,
    #[serde(rename = "today_data", default, deserialize_with = "lenient_samples")]
    pub today_window: Vec<Sample>,
}

impl LocationStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            current_busyness: None,
            vs_typical: None,
            trend: None,
            today_window: Vec::new(),
        }
    }
}

/// All location statuses from one successful poll, in upstream display order.
///
/// Names are unique. A snapshot is never modified after construction; the
/// refresher swaps in a whole new one instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    locations: Vec<LocationStatus>,
}

impl Snapshot {
    pub fn new(locations: Vec<LocationStatus>) -> Result<Self, FetchError> {
        let mut seen = HashSet::with_capacity(locations.len());
        for location in &locations {
            if !seen.insert(location.name.as_str()) {
                return Err(FetchError::DuplicateLocation(location.name.clone()));
            }
        }
        Ok(Self { locations })
    }

    /// Decode the upstream JSON array body.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let locations: Vec<LocationStatus> =
            serde_json::from_str(body).map_err(|err| FetchError::Payload(err.to_string()))?;
        Self::new(locations)
    }

    pub fn locations(&self) -> &[LocationStatus] {
        &self.locations
    }

    pub fn get(&self, name: &str) -> Option<&LocationStatus> {
        self.locations.iter().find(|location| location.name == name)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

fn parse_wall_clock(raw: &str) -> Option<PrimitiveDateTime> {
    if let Ok(datetime) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(PrimitiveDateTime::new(datetime.date(), datetime.time()));
    }

    // Naive "YYYY-MM-DDTHH:MM:SS" or "YYYY-MM-DD HH:MM:SS", fraction ignored.
    let head = raw.get(..19)?;
    let rest = &raw[19..];
    let fraction_ok = rest.is_empty()
        || rest
            .strip_prefix('.')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    if !fraction_ok {
        return None;
    }
    let normalized = head.replacen(' ', "T", 1);
    PrimitiveDateTime::parse(
        &normalized,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| value.as_f64()))
}

fn lenient_trend<'de, D>(deserializer: D) -> Result<Option<Trend>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(Trend::from_wire(&text)),
        Some(_) => Some(Trend::Unknown),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        _ => None,
    })
}

fn lenient_samples<'de, D>(deserializer: D) -> Result<Vec<Sample>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    // Entries that are not objects carry no reading and are skipped.
    Ok(items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value::<Sample>(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn decodes_upstream_payload_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"[
            {
                "location": "Proctor",
                "timestamp": "2025-11-03T12:00:00",
                "busyness_percentage": 42.5,
                "vs_typical_percentage": -3.2,
                "trend": "Steady",
                "today_data": [
                    {"timestamp": "2025-11-03T07:00:00", "busyness_percentage": null},
                    {"timestamp": "2025-11-03T07:10:00", "busyness_percentage": 12.0}
                ]
            },
            {
                "location": "Atwater",
                "timestamp": "2025-11-03T12:00:00",
                "busyness_percentage": null,
                "vs_typical_percentage": null,
                "trend": null,
                "today_data": []
            }
        ]"#;

        let snapshot = Snapshot::from_json(body)?;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.locations()[0].name, "Proctor");
        assert_eq!(snapshot.locations()[1].name, "Atwater");
        let proctor = snapshot.get("Proctor").ok_or("missing Proctor")?;
        assert_eq!(proctor.current_busyness, Some(42.5));
        assert_eq!(proctor.vs_typical, Some(-3.2));
        assert_eq!(proctor.trend, Some(Trend::Steady));
        assert_eq!(proctor.today_window.len(), 2);
        assert_eq!(proctor.today_window[0].busyness_percentage, None);
        let atwater = snapshot.get("Atwater").ok_or("missing Atwater")?;
        assert_eq!(atwater.current_busyness, None);
        assert_eq!(atwater.trend, None);
        Ok(())
    }

    #[test]
    fn unexpected_field_values_degrade_instead_of_failing() -> Result<(), Box<dyn std::error::Error>>
    {
        let body = r#"[
            {
                "location": "Ross",
                "busyness_percentage": "busy",
                "vs_typical_percentage": {"x": 1},
                "trend": "Sideways"
            },
            {
                "location": "Atwater",
                "busyness_percentage": 10,
                "trend": 7,
                "today_data": null
            }
        ]"#;

        let snapshot = Snapshot::from_json(body)?;

        let ross = snapshot.get("Ross").ok_or("missing Ross")?;
        assert_eq!(ross.current_busyness, None);
        assert_eq!(ross.vs_typical, None);
        assert_eq!(ross.trend, Some(Trend::Unknown));
        assert!(ross.today_window.is_empty());
        let atwater = snapshot.get("Atwater").ok_or("missing Atwater")?;
        assert_eq!(atwater.current_busyness, Some(10.0));
        assert_eq!(atwater.trend, Some(Trend::Unknown));
        Ok(())
    }

    #[test]
    fn non_array_body_is_a_payload_error() {
        let result = Snapshot::from_json(r#"{"detail": "No data available"}"#);

        assert!(matches!(result, Err(FetchError::Payload(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Snapshot::new(vec![LocationStatus::new("Ross"), LocationStatus::new("Ross")]);

        assert!(matches!(result, Err(FetchError::DuplicateLocation(name)) if name == "Ross"));
    }

    #[test]
    fn duplicate_sample_timestamps_are_kept() -> Result<(), Box<dyn std::error::Error>> {
        let body = r#"[{"location": "Ross", "today_data": [
            {"timestamp": "2025-11-03T08:00:00", "busyness_percentage": 10},
            {"timestamp": "2025-11-03T08:00:00", "busyness_percentage": 11}
        ]}]"#;

        let snapshot = Snapshot::from_json(body)?;

        assert_eq!(snapshot.locations()[0].today_window.len(), 2);
        Ok(())
    }

    #[test]
    fn local_time_accepts_rfc3339_and_naive_forms() {
        let with_offset = Sample::new("2025-11-03T09:05:00-05:00", Some(1.0));
        let naive = Sample::new("2025-11-03T13:30:00", Some(1.0));
        let spaced = Sample::new("2025-11-03 13:30:00.250000", Some(1.0));
        let garbage = Sample::new("yesterday-ish", Some(1.0));

        assert_eq!(with_offset.local_time(), Some(datetime!(2025-11-03 09:05:00)));
        assert_eq!(naive.local_time(), Some(datetime!(2025-11-03 13:30:00)));
        assert_eq!(spaced.local_time(), Some(datetime!(2025-11-03 13:30:00)));
        assert_eq!(garbage.local_time(), None);
    }
}

use crate::view::LocationView;
use serde::Serialize;

/// How current the served locations are.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Fresh,
    Stale,
    Refreshing,
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocationsSuccessResponse {
    pub status: DataStatus,
    pub fetched_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub locations: Vec<LocationView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocationsErrorResponse {
    pub error_code: LocationsErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationsErrorCode {
    Loading,
    LoadFailed,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthErrorResponse {
    pub error_code: HealthErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthErrorCode {
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationStatus, Sample};
    use crate::view::build_location_view;
    use serde_json::json;

    #[test]
    fn locations_response_serializes_views() {
        let mut status = LocationStatus::new("Ross");
        status.today_window = vec![Sample::new("2025-11-03T11:00:00", Some(12.0))];
        let response = LocationsSuccessResponse {
            status: DataStatus::Stale,
            fetched_at: "2025-11-03T16:00:00Z".to_string(),
            error_message: None,
            locations: vec![build_location_view(&status)],
        };

        let value = serde_json::to_value(response).expect("serialize locations response");
        assert_eq!(
            value,
            json!({
                "status": "stale",
                "fetched_at": "2025-11-03T16:00:00Z",
                "locations": [
                    {
                        "name": "Ross",
                        "is_closed": true,
                        "interactive": true,
                        "busyness_display": "Closed",
                        "tier": "closed",
                        "tier_color": "muted",
                        "border_width": 2,
                        "deviation": "unknown",
                        "trend_label": {"glyph": "—", "text": "Unknown"},
                        "chart_window": [
                            {"timestamp": "2025-11-03T11:00:00", "busyness_percentage": 12.0}
                        ],
                        "chart_points": [
                            {"timestamp": "2025-11-03T11:00:00", "time_label": "11:00 AM", "busyness": 12.0}
                        ]
                    }
                ]
            })
        );
    }

    #[test]
    fn failed_locations_response_includes_error_message() {
        let response = LocationsSuccessResponse {
            status: DataStatus::Failed,
            fetched_at: "2025-11-03T16:00:00Z".to_string(),
            error_message: Some("http status 502 (bad gateway)".to_string()),
            locations: Vec::new(),
        };

        let value = serde_json::to_value(response).expect("serialize locations response");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_message"], "http status 502 (bad gateway)");
    }

    #[test]
    fn locations_error_response_uses_screaming_snake_case_code() {
        let response = LocationsErrorResponse {
            error_code: LocationsErrorCode::LoadFailed,
            error_message: "Failed to load location data".to_string(),
            timestamp: "2025-11-03T16:01:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(
            value,
            json!({
                "error_code": "LOAD_FAILED",
                "error_message": "Failed to load location data",
                "timestamp": "2025-11-03T16:01:00Z"
            })
        );
    }

    #[test]
    fn health_success_response_serializes_status() {
        let response = HealthSuccessResponse {
            status: HealthStatus::Degraded,
            timestamp: "2025-11-03T16:02:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize health response");
        assert_eq!(
            value,
            json!({
                "status": "degraded",
                "timestamp": "2025-11-03T16:02:00Z"
            })
        );
    }

    #[test]
    fn health_error_response_uses_screaming_snake_case_code() {
        let response = HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: "boom".to_string(),
            timestamp: "2025-11-03T16:03:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize health error response");
        assert_eq!(value["error_code"], "INTERNAL_ERROR");
    }
}

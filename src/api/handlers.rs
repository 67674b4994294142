use crate::api::ApiState;
use crate::api::responses::{
    DataStatus, HealthErrorCode, HealthErrorResponse, HealthStatus, HealthSuccessResponse,
    LocationsErrorCode, LocationsErrorResponse, LocationsSuccessResponse,
};
use crate::state::{FetchStatus, QueryState};
use crate::view::build_dashboard;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::time::Instant;
use tracing::{debug, error};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum LocationsResponse {
    Success(LocationsSuccessResponse),
    Error {
        status: StatusCode,
        body: LocationsErrorResponse,
    },
}

impl IntoResponse for LocationsResponse {
    fn into_response(self) -> Response {
        match self {
            LocationsResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            LocationsResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_locations(State(state): State<ApiState>) -> impl IntoResponse {
    build_locations_response(&state, Instant::now(), SystemTime::now())
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(state): State<ApiState>) -> impl IntoResponse {
    build_health_response(&state, Instant::now(), SystemTime::now())
}

/// The presentation layer regained focus; refresh if the data is stale.
pub async fn post_focus(State(state): State<ApiState>) -> StatusCode {
    debug!("Focus event received");
    state.focus.notify();
    StatusCode::ACCEPTED
}

fn read_query_state(state: &ApiState) -> Option<QueryState> {
    state.store.read().ok().map(|guard| guard.state().clone())
}

fn build_locations_response(
    state: &ApiState,
    now: Instant,
    wall_now: SystemTime,
) -> LocationsResponse {
    let Some(query) = read_query_state(state) else {
        return internal_error("state lock poisoned while reading snapshot");
    };

    let Some(snapshot) = query.snapshot.as_ref() else {
        return match &query.status {
            FetchStatus::Failed { message, attempts } => {
                error!(attempts, error = %message, "No snapshot available after failed fetch");
                locations_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    LocationsErrorCode::LoadFailed,
                    "Failed to load location data",
                    wall_now,
                )
            }
            FetchStatus::Idle | FetchStatus::Fetching { .. } | FetchStatus::Ready => {
                locations_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    LocationsErrorCode::Loading,
                    "Location data is loading",
                    wall_now,
                )
            }
        };
    };

    let (status, error_message) = match &query.status {
        FetchStatus::Failed { message, .. } => (DataStatus::Failed, Some(message.clone())),
        FetchStatus::Fetching { .. } => (DataStatus::Refreshing, None),
        FetchStatus::Idle | FetchStatus::Ready => {
            if query.is_stale(now, state.stale_after) {
                (DataStatus::Stale, None)
            } else {
                (DataStatus::Fresh, None)
            }
        }
    };

    let fetched_at = match format_timestamp(query.fetched_at_wall.unwrap_or(wall_now)) {
        Ok(formatted) => formatted,
        Err(_) => return internal_error("timestamp formatting failure"),
    };

    LocationsResponse::Success(LocationsSuccessResponse {
        status,
        fetched_at,
        error_message,
        locations: build_dashboard(snapshot, &state.thresholds),
    })
}

fn locations_error(
    status: StatusCode,
    error_code: LocationsErrorCode,
    message: &str,
    now: SystemTime,
) -> LocationsResponse {
    match format_timestamp(now) {
        Ok(formatted) => LocationsResponse::Error {
            status,
            body: LocationsErrorResponse {
                error_code,
                error_message: message.to_string(),
                timestamp: formatted,
            },
        },
        Err(_err) => internal_error("timestamp formatting failure"),
    }
}

fn internal_error(message: &str) -> LocationsResponse {
    error!(
        message = message,
        "Internal error while handling /api/locations"
    );
    LocationsResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: LocationsErrorResponse {
            error_code: LocationsErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn fallback_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    })
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn build_health_response(state: &ApiState, now: Instant, wall_now: SystemTime) -> HealthResponse {
    let Some(query) = read_query_state(state) else {
        return health_internal_error("state lock poisoned while reading snapshot");
    };

    let status = derive_health_status(&query, now, state);

    let timestamp = match format_timestamp(wall_now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthSuccessResponse { status, timestamp },
    }
}

fn derive_health_status(query: &QueryState, now: Instant, state: &ApiState) -> HealthStatus {
    if query.snapshot.is_none() {
        return HealthStatus::Ko;
    }
    let failed = matches!(query.status, FetchStatus::Failed { .. });
    if failed || query.is_stale(now, state.stale_after) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(
        message = message,
        "Internal error while handling /api/health"
    );
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::model::{LocationStatus, Snapshot};
    use crate::refresh::FocusNotifier;
    use crate::state::SnapshotStore;
    use crate::view::ViewThresholds;
    use std::sync::{Arc, RwLock};
    use std::time::{Duration, UNIX_EPOCH};
    use tokio::sync::mpsc;

    const STALE_AFTER: Duration = Duration::from_secs(30);

    fn api_state(store: SnapshotStore) -> (ApiState, mpsc::Receiver<()>) {
        let (focus_tx, focus_rx) = mpsc::channel(1);
        let state = ApiState {
            store: Arc::new(RwLock::new(store)),
            focus: FocusNotifier::new(focus_tx),
            thresholds: ViewThresholds::default(),
            stale_after: STALE_AFTER,
        };
        (state, focus_rx)
    }

    fn loaded_store(now: Instant) -> SnapshotStore {
        let mut store = SnapshotStore::new();
        let ticket = store.begin_request().expect("open store");
        let mut proctor = LocationStatus::new("Proctor");
        proctor.current_busyness = Some(91.0);
        let snapshot =
            Snapshot::new(vec![proctor, LocationStatus::new("Ross")]).expect("unique names");
        store.complete(ticket, Ok(snapshot), 1, now);
        store
    }

    fn http_503() -> FetchError {
        FetchError::Http {
            status: 503,
            body: "No data available".to_string(),
        }
    }

    #[test]
    fn locations_returns_loading_before_first_fetch() {
        let (state, _focus_rx) = api_state(SnapshotStore::new());

        let response = build_locations_response(&state, Instant::now(), UNIX_EPOCH);

        match response {
            LocationsResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, LocationsErrorCode::Loading);
                assert_eq!(body.timestamp, "1970-01-01T00:00:00Z");
            }
            LocationsResponse::Success(_) => panic!("expected loading response"),
        }
    }

    #[test]
    fn locations_returns_load_failed_without_snapshot() {
        let mut store = SnapshotStore::new();
        let ticket = store.begin_request().expect("open store");
        store.complete(ticket, Err(http_503()), 3, Instant::now());
        let (state, _focus_rx) = api_state(store);

        let response = build_locations_response(&state, Instant::now(), UNIX_EPOCH);

        match response {
            LocationsResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, LocationsErrorCode::LoadFailed);
            }
            LocationsResponse::Success(_) => panic!("expected load failed response"),
        }
    }

    #[test]
    fn locations_returns_fresh_views_in_order() {
        let now = Instant::now();
        let (state, _focus_rx) = api_state(loaded_store(now));

        let response = build_locations_response(&state, now + Duration::from_secs(5), UNIX_EPOCH);

        match response {
            LocationsResponse::Success(body) => {
                assert_eq!(body.status, DataStatus::Fresh);
                assert_eq!(body.error_message, None);
                let names: Vec<&str> = body.locations.iter().map(|l| l.name.as_str()).collect();
                assert_eq!(names, vec!["Proctor", "Ross"]);
                assert_eq!(body.locations[0].busyness_display, "91%");
                assert!(body.locations[1].is_closed);
            }
            LocationsResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn locations_marks_old_data_stale() {
        let now = Instant::now();
        let (state, _focus_rx) = api_state(loaded_store(now));

        let response = build_locations_response(&state, now + STALE_AFTER, UNIX_EPOCH);

        match response {
            LocationsResponse::Success(body) => assert_eq!(body.status, DataStatus::Stale),
            LocationsResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn locations_keeps_snapshot_after_failure() {
        let now = Instant::now();
        let mut store = loaded_store(now);
        let ticket = store.begin_request().expect("open store");
        store.complete(ticket, Err(http_503()), 3, now);
        let (state, _focus_rx) = api_state(store);

        let response = build_locations_response(&state, now, UNIX_EPOCH);

        match response {
            LocationsResponse::Success(body) => {
                assert_eq!(body.status, DataStatus::Failed);
                assert_eq!(
                    body.error_message.as_deref(),
                    Some("http status 503 (No data available)")
                );
                assert_eq!(body.locations.len(), 2);
            }
            LocationsResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn locations_reports_refreshing_while_request_in_flight() {
        let now = Instant::now();
        let mut store = loaded_store(now);
        let _ticket = store.begin_request().expect("open store");
        let (state, _focus_rx) = api_state(store);

        let response = build_locations_response(&state, now, UNIX_EPOCH);

        match response {
            LocationsResponse::Success(body) => assert_eq!(body.status, DataStatus::Refreshing),
            LocationsResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn locations_returns_internal_error_when_lock_poisoned() {
        let (state, _focus_rx) = api_state(SnapshotStore::new());
        let store = Arc::clone(&state.store);
        let _ = std::thread::spawn(move || {
            let _guard = store.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        let response = build_locations_response(&state, Instant::now(), UNIX_EPOCH);

        match response {
            LocationsResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, LocationsErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
            }
            LocationsResponse::Success(_) => panic!("expected internal error response"),
        }
    }

    #[test]
    fn health_reflects_data_availability() {
        let now = Instant::now();
        let (empty, _rx1) = api_state(SnapshotStore::new());
        let (loaded, _rx2) = api_state(loaded_store(now));

        match build_health_response(&empty, now, UNIX_EPOCH) {
            HealthResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.status, HealthStatus::Ko);
            }
            HealthResponse::Error { .. } => panic!("expected health response"),
        }
        match build_health_response(&loaded, now, UNIX_EPOCH) {
            HealthResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body.status, HealthStatus::Ok);
                assert_eq!(body.timestamp, "1970-01-01T00:00:00Z");
            }
            HealthResponse::Error { .. } => panic!("expected health response"),
        }
        match build_health_response(&loaded, now + STALE_AFTER, UNIX_EPOCH) {
            HealthResponse::Success { body, .. } => assert_eq!(body.status, HealthStatus::Degraded),
            HealthResponse::Error { .. } => panic!("expected health response"),
        }
    }

    #[tokio::test]
    async fn focus_handler_forwards_event() {
        let (state, mut focus_rx) = api_state(SnapshotStore::new());

        let status = post_focus(State(state)).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(focus_rx.try_recv(), Ok(()));
    }
}

use crate::refresh::FocusNotifier;
use crate::state::SnapshotStore;
use crate::view::ViewThresholds;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub mod handlers;
pub mod responses;

/// Shared handler state: read access to the snapshot plus the focus hook.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub store: Arc<RwLock<SnapshotStore>>,
    pub focus: FocusNotifier,
    pub thresholds: ViewThresholds,
    pub stale_after: Duration,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/locations", get(handlers::get_locations))
        .route("/api/health", get(handlers::get_health))
        .route("/api/focus", post(handlers::post_focus))
        .with_state(state)
}

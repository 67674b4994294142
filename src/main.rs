use middlines::api::{self, ApiState};
use middlines::config;
use middlines::refresh::{Refresher, spawn_refresh_loop};
use middlines::source::http::HttpSource;
use std::net::SocketAddr;
use tracing::Level;

fn init_tracing(level: &str) {
    let parsed = level.parse::<Level>().ok();
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(parsed.unwrap_or(Level::INFO))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    if parsed.is_none() {
        tracing::warn!(level, "Unknown log level, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_from_path(&config_path)?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = %config_path,
        app = %config.app.name,
        "middlines starting"
    );

    let source = HttpSource::new(config.upstream_url(), config.upstream_timeout())?;
    tracing::info!(
        endpoint = source.endpoint(),
        timeout_ms = config.upstream_timeout().as_millis() as u64,
        "Upstream source configured"
    );

    let policy = config.refresh_policy();
    let refresher = Refresher::new(source, policy.clone());
    let store = refresher.store();
    let refresh_task = spawn_refresh_loop(refresher);

    let state = ApiState {
        store,
        focus: refresh_task.focus(),
        thresholds: config.view_thresholds(),
        stale_after: policy.stale_after,
    };
    let app = api::router(state);
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_task.stop().await;
    tracing::info!("middlines stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

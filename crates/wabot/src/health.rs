use axum::{extract::State, response::Json, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use wabot_common::ConnectionState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connection: ConnectionState,
}

#[derive(Clone)]
struct AppState {
    bot_name: Arc<str>,
    connection: watch::Receiver<ConnectionState>,
    metrics: Option<PrometheusHandle>,
}

/// Builds the HTTP router. `/metrics` is only served when a handle is given.
pub fn app(
    bot_name: &str,
    connection: watch::Receiver<ConnectionState>,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = AppState {
        bot_name: Arc::from(bot_name),
        connection,
        metrics,
    };
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// # Errors
///
/// Returns an error if the metrics recorder cannot be installed or binding
/// the HTTP server fails.
pub async fn start_health_server(
    addr: SocketAddr,
    bot_name: &str,
    connection: watch::Receiver<ConnectionState>,
) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let app = app(bot_name, connection, Some(handle));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("health server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Liveness string.
async fn root_handler(State(state): State<AppState>) -> String {
    format!("{} is running!", state.bot_name)
}

/// Health check handler - always 200, with the current connection state.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connection = *state.connection.borrow();
    Json(HealthResponse {
        status: "healthy",
        connection,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let (_tx, rx) = watch::channel(ConnectionState::Connecting);
        let addr = serve(app("wabot", rx, None)).await;

        let body = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "wabot is running!");
    }

    #[tokio::test]
    async fn health_tracks_connection_state() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        let addr = serve(app("wabot", rx, None)).await;

        let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connection"], "connecting");

        tx.send_replace(ConnectionState::Open);
        let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["connection"], "open");
    }
}

mod handlers;
mod state;
mod tasks;

use axum::{
    Router,
    routing::{get, post},
};
use dlqueue::DownloadStore;
use dlqueue::config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Level, info};

use crate::handlers::api;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let settings = Settings::new().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(&settings.log_level)
        .init();

    info!("Starting dlqueue...");

    let store = Arc::new(DownloadStore::with_sample_threshold(
        settings.sample_threshold_bytes,
    ));
    let (tx, _) = broadcast::channel(100);

    let state = AppState {
        store,
        settings: settings.clone(),
        tx,
    };

    tasks::start_background_tasks(state.clone());

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server_port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/progress", get(api::progress))
        .route("/api/queue", get(api::queue))
        .route("/api/queue/clear", post(api::clear_finished))
        .route("/api/queue/clear-all", post(api::clear_all))
        .route("/api/queue/cancel", post(api::cancel_queued))
        .route("/events", get(api::sse_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use dlqueue::{DownloadQueueInfo, DownloadStatus, ProgressInfo};

    fn setup_test_app() -> (TestServer, AppState) {
        let settings = Settings {
            server_port: 0,
            log_level: "info".to_string(),
            sample_threshold_bytes: 256 * 1024,
            broadcast_interval_ms: 1000,
        };
        let (tx, _) = broadcast::channel(10);
        let state = AppState {
            store: Arc::new(DownloadStore::new()),
            settings,
            tx,
        };

        let app = create_app(state.clone());
        (TestServer::new(app).unwrap(), state)
    }

    #[tokio::test]
    async fn test_queue_snapshot() {
        let (server, state) = setup_test_app();
        state.store.enqueue("a", "Song", "Artist", "Album", "sid");
        state.store.enqueue("b", "Song 2", "Artist", "Album", "sid2");
        state.store.start("a");

        let response = server.get("/api/queue").await;
        response.assert_status_ok();
        let info: DownloadQueueInfo = response.json();
        assert_eq!(info.queue.len(), 2);
        assert_eq!(info.queued_count, 1);
        assert_eq!(info.queue[0].status, DownloadStatus::Downloading);
        assert!(info.session_start_time > 0);
    }

    #[tokio::test]
    async fn test_queue_field_names() {
        let (server, state) = setup_test_app();
        state.store.enqueue("a", "Song", "Artist", "Album", "sid");

        let body: serde_json::Value = server.get("/api/queue").await.json();
        for key in [
            "is_downloading",
            "queue",
            "current_speed",
            "total_downloaded",
            "session_start_time",
            "queued_count",
            "completed_count",
            "failed_count",
            "skipped_count",
        ] {
            assert!(body.get(key).is_some(), "missing {key}");
        }
        assert_eq!(body["queue"][0]["status"], "queued");
        assert_eq!(body["queue"][0]["track_name"], "Song");
    }

    #[tokio::test]
    async fn test_progress() {
        let (server, state) = setup_test_app();
        let _guard = state.store.begin_download();

        let response = server.get("/api/progress").await;
        response.assert_status_ok();
        let info: ProgressInfo = response.json();
        assert!(info.is_downloading);
        assert_eq!(info.mb_downloaded, 0.0);
    }

    #[tokio::test]
    async fn test_cancel_and_clear() {
        let (server, state) = setup_test_app();
        state.store.enqueue("a", "Song", "Artist", "Album", "sid");
        state.store.enqueue("b", "Song 2", "Artist", "Album", "sid2");
        state.store.start("a");

        server.post("/api/queue/cancel").await.assert_status_ok();
        let skipped = state.store.get("b").unwrap();
        assert_eq!(skipped.status, DownloadStatus::Skipped);
        assert_eq!(skipped.error_message, "Cancelled");

        server.post("/api/queue/clear").await.assert_status_ok();
        let info: DownloadQueueInfo = server.get("/api/queue").await.json();
        assert_eq!(info.queue.len(), 1);
        assert_eq!(info.queue[0].id, "a");

        let response = server.post("/api/queue/clear-all").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert!(state.store.snapshot().queue.is_empty());
    }
}

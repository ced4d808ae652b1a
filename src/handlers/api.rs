use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use dlqueue::{DownloadQueueInfo, ProgressInfo};
use futures::stream::{Stream, StreamExt};
use tracing::info;

use crate::state::AppState;

pub async fn progress(State(state): State<AppState>) -> Json<ProgressInfo> {
    Json(state.store.progress())
}

pub async fn queue(State(state): State<AppState>) -> Json<DownloadQueueInfo> {
    Json(state.store.snapshot())
}

pub async fn clear_finished(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("Clearing finished downloads on request");
    state.store.clear_terminal();
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn clear_all(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("Clearing all downloads on request");
    state.store.clear_all();
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn cancel_queued(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("Cancelling queued downloads on request");
    state.store.cancel_all_queued();
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.tx.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).map(|msg| match msg {
        Ok(msg) => Ok(Event::default().data(msg)),
        Err(_) => Ok(Event::default().comment("keepalive")),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

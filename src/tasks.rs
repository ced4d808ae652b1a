use crate::state::AppState;
use std::time::Duration;
use tracing::{info, warn};

pub fn start_background_tasks(state: AppState) {
    // Queue Snapshot Broadcast Task
    tokio::spawn(async move {
        let period = Duration::from_millis(state.settings.broadcast_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        info!("Broadcasting queue snapshots every {:?}", period);

        loop {
            interval.tick().await;
            if state.tx.receiver_count() == 0 {
                continue;
            }

            let info = state.store.snapshot();
            if info.queue.is_empty() {
                continue;
            }

            match serde_json::to_value(&info) {
                Ok(data_json) => {
                    let msg = serde_json::json!({
                        "type": "queue",
                        "data": data_json
                    })
                    .to_string();
                    let _ = state.tx.send(msg);
                }
                Err(e) => warn!("Failed to serialize queue snapshot: {}", e),
            }
        }
    });
}

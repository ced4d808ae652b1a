use dlqueue::DownloadStore;
use dlqueue::config::Settings;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DownloadStore>,
    pub settings: Settings,
    pub tx: broadcast::Sender<String>,
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub log_level: String,
    /// Bytes a sampler must see between two throughput samples.
    pub sample_threshold_bytes: u64,
    /// How often the queue snapshot is pushed to `/events` subscribers.
    pub broadcast_interval_ms: u64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config")
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            // Default settings
            .set_default("server_port", 3000)?
            .set_default("log_level", "info")?
            .set_default("sample_threshold_bytes", 256 * 1024)?
            .set_default("broadcast_interval_ms", 1000)?
            // Config file (optional)
            .add_source(File::with_name(name).required(false))
            // Environment variables (e.g. DLQUEUE_SERVER_PORT=8080)
            .add_source(Environment::with_prefix("DLQUEUE"));

        builder.build()?.try_deserialize()
    }
}

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub polling: PollingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the conversion service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    /// Delay between progress queries in milliseconds
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Directory finished audiobooks are written to
    pub download_dir: String,
}

impl Config {
    /// Load configuration: built-in defaults, overridden by an optional
    /// config file, overridden by `AI_READER_*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.base_url", "http://localhost:8000")?
            .set_default("service.request_timeout_secs", 30)?
            .set_default("polling.interval_ms", 1000)?
            .set_default("output.download_dir", "audiobooks")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AI_READER").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

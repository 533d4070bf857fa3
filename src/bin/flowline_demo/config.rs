//! Demo-binary-only configuration. Nothing here is part of the library;
//! the core crate takes its tuning (worker counts, queue capacities,
//! trigger intervals) as plain constructor arguments instead.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_produce_interval", with = "humantime_serde")]
    pub produce_interval: Duration,

    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_worker_count() -> usize {
    4
}

fn default_produce_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9898".to_string()
}

impl DemoConfig {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLOWLINE").separator("__"))
            .build()
            .context("failed to assemble configuration sources")?;

        match settings.try_deserialize() {
            Ok(cfg) => Ok(cfg),
            Err(config::ConfigError::NotFound(_)) => Ok(Self {
                queue_capacity: default_queue_capacity(),
                worker_count: default_worker_count(),
                produce_interval: default_produce_interval(),
                metrics_addr: default_metrics_addr(),
            }),
            Err(e) => Err(e).context("failed to parse configuration"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.queue_capacity > 0, "queue_capacity must be at least 1");
        anyhow::ensure!(self.worker_count > 0, "worker_count must be at least 1");
        self.metrics_addr
            .parse::<std::net::SocketAddr>()
            .context("metrics_addr must be a valid socket address")?;
        Ok(())
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

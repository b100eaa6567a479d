use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{BungieConfig, MonitorConfig, StorageConfig};

use crate::error::{Result, WorkerError};

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub bungie: BungieConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("RACEBOT_CONFIG").unwrap_or_else(|_| "config/config".to_string());
        Self::load_from(&config_path)
    }

    /// Defaults, then the optional file at `config_path`, then `RACEBOT__*` overrides.
    pub fn load_from(config_path: &str) -> Result<Self> {
        let s = Config::builder()
            .set_default("bungie.base_url", "https://www.bungie.net/Platform")?
            .set_default("monitor.interval_secs", 3600_i64)?
            .set_default("monitor.log_level", "info")?
            .set_default("storage.state_dir", "./data/guilds")?
            .set_default("storage.publish_dir", "./data/published")?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("RACEBOT").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bungie.api_key.trim().is_empty() {
            return Err(WorkerError::MissingApiKey);
        }
        if self.monitor.interval_secs == 0 {
            return Err(WorkerError::Config(ConfigError::Message(
                "monitor.interval_secs must be positive".into(),
            )));
        }
        Ok(())
    }
}

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub path: String,
    pub flush_debounce_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Earning {
    pub base_amount_per_tick: f64,
    pub tick_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Admin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: Storage,
    pub earning: Earning,
    pub admin: Admin,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Leveling {
    #[serde(default = "default_max_stale_retries")]
    pub max_stale_retries: u32,
}

#[derive(Debug, Deserialize)]
pub struct SettingsCache {
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Earnings {
    #[serde(default = "default_zero_months")]
    pub default_zero_months: u32,
    #[serde(default)]
    pub default_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub leveling: Leveling,
    #[serde(default)]
    pub settings_cache: SettingsCache,
    #[serde(default)]
    pub earnings: Earnings,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("REFERRALS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Http {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for Leveling {
    fn default() -> Self {
        Self {
            max_stale_retries: default_max_stale_retries(),
        }
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
        }
    }
}

impl Default for Earnings {
    fn default() -> Self {
        Self {
            default_zero_months: default_zero_months(),
            default_price: 0.0,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_stale_retries() -> u32 {
    3
}

fn default_refresh_secs() -> u64 {
    60
}

fn default_zero_months() -> u32 {
    4
}

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use err_derive::Error;
use log::*;
use r2d2::Pool;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use infra::persistence::{self, DatabaseConnectionManager};

use crate::locations::{Geocoder, NoGeocoder, YandexGeocoder};

const ENV_PREFIX: &str = "FOODCART_";
const YANDEX_ENDPOINT: &str = "https://geocode-maps.yandex.ru/1.x";

#[derive(Deserialize, Debug)]
pub struct Config {
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

#[derive(Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Deserialize)]
pub struct GeocoderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(display = "postgres.pool_size must be at least 1")]
    EmptyPool,
    #[error(display = "geocoder.timeout_ms must be at least 1")]
    NoTimeout,
}

/// Secrets that may come from the environment rather than the file.
#[derive(Deserialize, Debug, Default)]
struct EnvOverrides {
    database_url: Option<String>,
    geocoder_apikey: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug, Default)]
pub struct EnvLogger {
    #[serde(default)]
    level: Option<LogLevel>,
    #[serde(default)]
    modules: HashMap<String, LogLevel>,
    #[serde(default)]
    timestamp_nanos: bool,
}

fn default_pool_size() -> u32 {
    8
}

fn default_endpoint() -> Url {
    Url::parse(YANDEX_ENDPOINT).expect("static geocoder endpoint")
}

fn default_timeout_ms() -> u64 {
    3000
}

/// Reads a TOML file into any config shape; binaries flatten [`Config`]
/// into their own.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config = toml::from_str(&buf).with_context(|| format!("parse {}", path.display()))?;
    Ok(config)
}

impl Config {
    /// Applies `FOODCART_DATABASE_URL` and `FOODCART_GEOCODER_APIKEY`.
    pub fn apply_env(&mut self) -> Result<()> {
        let env: EnvOverrides = envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("read environment overrides")?;
        self.apply_overrides(env);
        Ok(())
    }

    fn apply_overrides(&mut self, env: EnvOverrides) {
        if let Some(url) = env.database_url {
            debug!("Database url taken from environment");
            self.postgres.url = url;
        }
        if let Some(key) = env.geocoder_apikey {
            debug!("Geocoder key taken from environment");
            self.geocoder.api_key = Some(key);
        }
    }
}

impl PostgresConfig {
    pub(crate) fn build(&self) -> Result<Pool<DatabaseConnectionManager>> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool.into());
        }
        debug!("Build pool of {} connections", self.pool_size);
        persistence::pool(&self.url, self.pool_size)
    }
}

impl GeocoderConfig {
    pub(crate) fn build(&self) -> Result<Arc<dyn Geocoder>> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::NoTimeout.into());
        }
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                info!("Geocoding via {}", self.endpoint);
                let timeout = Duration::from_millis(self.timeout_ms);
                let geocoder = YandexGeocoder::new(self.endpoint.clone(), key, timeout)
                    .context("build geocoder client")?;
                Ok(Arc::new(geocoder))
            }
            _ => {
                warn!("No geocoder API key configured; new locations will have no coordinates");
                Ok(Arc::new(NoGeocoder))
            }
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            api_key: None,
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl fmt::Debug for GeocoderConfig {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("GeocoderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl LogLevel {
    fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level {
            b.filter_level(level.to_filter());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(module, level.to_filter());
        }

        if self.timestamp_nanos {
            b.format_timestamp_nanos();
        }

        b
    }
}

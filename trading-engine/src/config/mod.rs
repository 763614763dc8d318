use anyhow::{bail, Context};
use common::TimeInForce;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "BINANCE_TESTNET_API_KEY";
pub const API_SECRET_ENV: &str = "BINANCE_TESTNET_API_SECRET";
pub const BASE_URL_ENV: &str = "BINANCE_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
    /// Never read from or written to the config file.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout_ms: u64,
    pub client_order_id_prefix: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet.binancefuture.com".to_string(),
            recv_window_ms: 5000,
            timeout_ms: 10_000,
            client_order_id_prefix: "fx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Decimal places TWAP slice quantities are rounded to.
    pub quantity_precision: u32,
    /// Decimal places grid level prices are rounded to.
    pub price_precision: u32,
    pub time_in_force: TimeInForce,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            quantity_precision: 6,
            price_precision: 2,
            time_in_force: TimeInForce::GTC,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
    /// Used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "app.log".to_string(),
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .finish()
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.executor.time_in_force {
            TimeInForce::GTC | TimeInForce::IOC | TimeInForce::FOK | TimeInForce::GTX => Ok(()),
            other => bail!(
                "executor.time_in_force must be GTC, IOC, FOK or GTX, got {}",
                other
            ),
        }
    }

    /// Loads the file if given (defaults otherwise), then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            self.exchange.base_url = base_url;
        }
        if let (Some(api_key), Some(secret_key)) = (non_empty(API_KEY_ENV), non_empty(API_SECRET_ENV)) {
            self.credentials = Some(Credentials {
                api_key,
                secret_key,
            });
        }
    }
}

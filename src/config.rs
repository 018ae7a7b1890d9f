// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::domain::model::MAX_HISTORY;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Watchlist tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quote endpoint settings
    pub quote: QuoteConfig,

    /// Background refresh settings
    pub poller: PollerConfig,

    /// Watchlist file settings
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Symbols to watch when the stored watchlist is empty
    #[serde(default)]
    pub seed_symbols: Vec<String>,
}

/// Quote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Base URL of the quote endpoint
    pub endpoint: String,

    /// API key passed as `apikey`
    pub api_key: String,

    /// Per-fetch timeout in seconds
    pub timeout_secs: u64,

    /// Fixed seed for the synthetic fallback (random if unset)
    pub synthetic_seed: Option<u64>,
}

/// Poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between refresh cycles
    pub interval_secs: u64,

    /// Prices retained per symbol
    pub history_capacity: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the watchlist JSON file
    pub watchlist_path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl QuoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let quote_config = QuoteConfig {
            endpoint: env::var("QUOTE_ENDPOINT").unwrap_or(defaults.quote.endpoint),
            api_key: env::var("QUOTE_API_KEY").unwrap_or(defaults.quote.api_key),
            timeout_secs: env_or("QUOTE_TIMEOUT_SECS", defaults.quote.timeout_secs),
            synthetic_seed: env::var("SYNTHETIC_SEED")
                .ok()
                .map(|seed| {
                    seed.trim().parse().map_err(|_| {
                        AppError::Config(format!("Invalid SYNTHETIC_SEED: {}", seed))
                    })
                })
                .transpose()?,
        };

        let poller_config = PollerConfig {
            interval_secs: env_or("POLL_INTERVAL_SECS", defaults.poller.interval_secs),
            history_capacity: env_or("HISTORY_CAPACITY", defaults.poller.history_capacity),
        };

        let storage_config = StorageConfig {
            watchlist_path: env::var("WATCHLIST_FILE").unwrap_or(defaults.storage.watchlist_path),
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: env_or("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let seed_symbols = env::var("WATCHLIST_SYMBOLS")
            .map(|symbols| {
                symbols
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Config {
            quote: quote_config,
            poller: poller_config,
            storage: storage_config,
            logging: logging_config,
            seed_symbols,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.poller.interval_secs == 0 {
            return Err(AppError::Config("Poll interval must be at least 1 second".to_string()));
        }
        if self.poller.history_capacity == 0 || self.poller.history_capacity > MAX_HISTORY {
            return Err(AppError::Config(format!(
                "History capacity must be between 1 and {}, got: {}",
                MAX_HISTORY, self.poller.history_capacity
            )));
        }
        if self.quote.timeout_secs == 0 {
            return Err(AppError::Config("Quote timeout must be at least 1 second".to_string()));
        }
        if !self.quote.endpoint.starts_with("http://") && !self.quote.endpoint.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Quote endpoint must start with http:// or https://, got: {}",
                self.quote.endpoint
            )));
        }
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quote: QuoteConfig {
                endpoint: "https://www.alphavantage.co/query".to_string(),
                api_key: "demo".to_string(),
                timeout_secs: 5,
                synthetic_seed: None,
            },
            poller: PollerConfig {
                interval_secs: 10,
                history_capacity: MAX_HISTORY,
            },
            storage: StorageConfig {
                watchlist_path: "watchlist.json".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
            seed_symbols: Vec::new(),
        }
    }
}

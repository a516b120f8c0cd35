use crate::constants::{LEDGER_API_TIMEOUT, TRANSACTION_TIMEOUT};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub ledger_base_url: String,
    pub log_level: String,
    /// Seconds before an unsettled transaction expires.
    pub transaction_timeout_secs: u64,
    /// Per-request bound on ledger calls, in seconds.
    pub ledger_timeout_secs: u64,
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            ledger_base_url: env::var("LEDGER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            transaction_timeout_secs: env::var("TRANSACTION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(TRANSACTION_TIMEOUT.as_secs()),
            ledger_timeout_secs: env::var("LEDGER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(LEDGER_API_TIMEOUT.as_secs()),
        }
    }
}

// Global static accessible everywhere
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

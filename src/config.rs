use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub fmp_api_key: String,
    pub fmp_base_url: String,
    pub market_data_timeout: Duration,
    pub opening_balance: Decimal,
    pub trade_max_retries: u32,
    pub listen_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let opening_balance = match non_empty("OPENING_BALANCE") {
            Some(raw) => Decimal::from_str(raw.trim())
                .ok()
                .filter(|b| !b.is_sign_negative())
                .ok_or(ConfigError {
                    key: "OPENING_BALANCE",
                    value: raw,
                })?,
            None => Decimal::new(1_000_000, 2),
        };

        let listen_addr = match non_empty("LISTEN_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
                key: "LISTEN_ADDR",
                value: raw.clone(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let log_format = match non_empty("LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parsed_or(non_empty("DB_MAX_CONNECTIONS"), 10),
            jwt_secret: non_empty("JWT_SECRET")
                .unwrap_or_else(|| "your-secret-key-change-in-production".into()),
            jwt_audience: non_empty("JWT_AUDIENCE"),
            fmp_api_key: non_empty("FMP_API_KEY").unwrap_or_else(|| "demo".into()),
            fmp_base_url: non_empty("FMP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://financialmodelingprep.com/api/v3".into()),
            market_data_timeout: Duration::from_secs(parsed_or(non_empty("MARKET_DATA_TIMEOUT_SECS"), 10)),
            opening_balance,
            trade_max_retries: parsed_or(non_empty("TRADE_MAX_RETRIES"), 3),
            listen_addr,
            log_format,
        })
    }
}

/// Out of range or malformed values fall back to `default`.
fn parsed_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

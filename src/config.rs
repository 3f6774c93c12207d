use std::{env, time::Duration};

use color_eyre::eyre::{OptionExt, Result, eyre};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DATABASE_URL: &str = "sqlite:transfers.db?mode=rwc";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_ASSET_ID: &str = "BTC";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub blockchain_api_url: String,
    pub blockchain_api_timeout: Duration,
    pub database_url: String,
    pub listen_addr: String,
    pub asset_id: String,
    /// Merchant wallets loaded on startup, if set.
    pub merchant_wallets_csv: Option<String>,
    pub log_level: String,
    pub log_json: bool,
}

impl AppConfig {
    /// Reads the process environment, after loading a `.env` file if there is one.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let blockchain_api_url = var("BLOCKCHAIN_API_URL").ok_or_eyre("BLOCKCHAIN_API_URL not set")?;

        let timeout_secs = match var("BLOCKCHAIN_API_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|e| eyre!("Invalid BLOCKCHAIN_API_TIMEOUT_SECS '{}': {}", v, e))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let log_json = match var("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => return Err(eyre!("Invalid LOG_FORMAT '{}', expected text or json", other)),
        };

        Ok(AppConfig {
            blockchain_api_url,
            blockchain_api_timeout: Duration::from_secs(timeout_secs),
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned()),
            asset_id: var("TRANSFER_ASSET_ID").unwrap_or_else(|| DEFAULT_ASSET_ID.to_owned()),
            merchant_wallets_csv: var("MERCHANT_WALLETS_CSV"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            log_json,
        })
    }
}

use anyhow::Result;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Fee percent applied when a user has no override, and forced for
    /// below-threshold amounts.
    pub default_fee_percent: f64,
    /// Age after which an unresolved transaction is auto-cancelled.
    pub stale_after_minutes: i64,
    /// How often the reaper sweeps.
    pub reaper_interval_secs: u64,
    /// Age after which an unresolved transaction raises a staleness alert.
    pub alert_after_minutes: i64,
    /// Minimum gap between repeated alerts for the same transaction.
    pub realert_minutes: i64,
    pub price_url: String,
    pub price_fallback_rate: f64,
    /// Bounded wait for row locks; expiry surfaces as a retryable Busy.
    pub lock_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL")?,
            default_fee_percent: parse_or("DEFAULT_FEE_PERCENT", 20.0)?,
            stale_after_minutes: parse_or("STALE_AFTER_MINUTES", 24 * 60)?,
            reaper_interval_secs: parse_or("REAPER_INTERVAL_SECS", 3600)?,
            alert_after_minutes: parse_or("ALERT_AFTER_MINUTES", 45)?,
            realert_minutes: parse_or("REALERT_MINUTES", 30)?,
            price_url: env::var("PRICE_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3/simple/price".to_string()),
            price_fallback_rate: parse_or("PRICE_FALLBACK_RATE", 1450.0)?,
            lock_timeout_ms: parse_or("LOCK_TIMEOUT_MS", 2000)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}

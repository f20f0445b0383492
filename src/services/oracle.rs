//! Price oracle client.
//!
//! Supplies the fiat -> balance-unit conversion rate. The upstream is
//! treated as fallible: responses are cached for a short TTL, stale cache
//! beats an upstream error, and a rate outside the sane band is replaced
//! by the fixed fallback so a bad quote can never fail a ledger operation.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(30);
const RATE_BAND_MIN: f64 = 100.0;
const RATE_BAND_MAX: f64 = 5000.0;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    tether: QuotedPrice,
}

#[derive(Debug, Deserialize)]
struct QuotedPrice {
    ars: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct PriceOracle {
    client: reqwest::Client,
    url: String,
    fallback_rate: f64,
    cache: Arc<RwLock<Option<CachedRate>>>,
}

impl PriceOracle {
    pub fn new(url: String, fallback_rate: f64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client build");

        Self {
            client,
            url,
            fallback_rate,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Rate used for fee calculations: fetched (or cached) and bounds-checked.
    /// Captured once per calculation by the caller, never re-queried mid-flow.
    pub async fn conversion_rate(&self) -> f64 {
        let rate = self.rate().await;
        if !(RATE_BAND_MIN..=RATE_BAND_MAX).contains(&rate) {
            tracing::warn!(
                rate,
                fallback = self.fallback_rate,
                "oracle rate outside sane band, substituting fallback"
            );
            return self.fallback_rate;
        }
        rate
    }

    async fn rate(&self) -> f64 {
        if let Some(cached) = *self.cache.read().await {
            if cached.fetched_at.elapsed() < CACHE_TTL {
                return cached.rate;
            }
        }

        match self.fetch().await {
            Ok(rate) if rate > 0.0 => {
                *self.cache.write().await = Some(CachedRate {
                    rate,
                    fetched_at: Instant::now(),
                });
                rate
            }
            Ok(rate) => {
                tracing::error!(rate, "oracle returned a non-positive rate");
                self.stale_or_fallback().await
            }
            Err(e) => {
                tracing::error!(error = %e, "oracle fetch failed");
                self.stale_or_fallback().await
            }
        }
    }

    /// An expired cache entry is still better than the hardcoded fallback.
    async fn stale_or_fallback(&self) -> f64 {
        if let Some(cached) = *self.cache.read().await {
            tracing::info!("using stale cached rate after oracle error");
            return cached.rate;
        }
        self.fallback_rate
    }

    async fn fetch(&self) -> Result<f64, reqwest::Error> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<PriceResponse>()
            .await?;
        Ok(response.tether.ars)
    }
}

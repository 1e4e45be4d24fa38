//! External collaborator seams
//!
//! Everything the decision engine does not own lives behind these
//! traits: market-data scraping, chart rendering and message
//! transport. Retries, fingerprints and rate limiting are the
//! collaborator's own concern; the core only sees pass/fail.

pub mod dexscreener;
pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::TokenMetrics;

/// One OHLCV candle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    /// Epoch seconds
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

/// Market-data source. Any failure means "cannot evaluate": the caller
/// reports the error and does not filter.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch a full metrics snapshot for one token
    async fn fetch_all(&self, chain: &str, address: &str) -> Result<TokenMetrics>;

    /// Fetch candles covering the last `minutes`. Allowed to fail
    /// independently of `fetch_all`; callers tolerate an empty chart.
    async fn fetch_chart(&self, chain: &str, address: &str, minutes: u32) -> Result<Vec<Bar>>;

    /// Fetch the external risk scores `(sol_sniffer, token_sniffer)`.
    /// Called at most once per processed CA, and only after the basic
    /// filters passed. A source without scores returns `(None, None)`.
    async fn fetch_risk_scores(&self, metrics: &TokenMetrics)
        -> Result<(Option<f64>, Option<f64>)>;
}

/// Price-chart image renderer. Failure is fatal to that invocation's
/// notification and must carry a clear error string.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, metrics: &TokenMetrics, bars: &[Bar]) -> Result<Vec<u8>>;
}

/// Message transport to one destination
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &str, text: &str, photo: Option<&[u8]>) -> Result<()>;
}

/// Notifier that only logs, used for dry runs and as a default when no
/// bot token is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, target: &str, text: &str, photo: Option<&[u8]>) -> Result<()> {
        tracing::info!(
            target_chat = target,
            photo_bytes = photo.map(|p| p.len()).unwrap_or(0),
            "DRY-RUN notification: {}",
            text.lines().next().unwrap_or("")
        );
        Ok(())
    }
}

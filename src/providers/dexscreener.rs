//! DexScreener-backed metrics provider
//!
//! Maps the public pair endpoint onto `TokenMetrics`. DexScreener has
//! no holder or sniffer data, so those fields stay `None` and the
//! filter evaluator's partial-data rules apply.

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metrics::TokenMetrics;
use crate::providers::{Bar, MetricsProvider};

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnCount {
    pub buys: u32,
    pub sells: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txns {
    pub m5: Option<TxnCount>,
    pub h1: Option<TxnCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    pub price_change: Option<PriceChange>,
    pub txns: Option<Txns>,
    pub liquidity: Option<Liquidity>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
    #[serde(rename = "pairCreatedAt")]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenPairsResponse {
    pairs: Option<Vec<DexPair>>,
}

pub struct DexScreenerProvider {
    client: reqwest::Client,
    base_url: String,
    max_retry_secs: u64,
}

impl DexScreenerProvider {
    pub fn new(timeout_secs: u64, max_retry_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: DEXSCREENER_BASE.to_string(),
            max_retry_secs,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_token_pairs(&self, address: &str) -> Result<Vec<DexPair>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, address);
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(self.max_retry_secs)),
            ..Default::default()
        };
        let resp = backoff::future::retry(policy, || async {
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(backoff::Error::transient)?;
            resp.error_for_status().map_err(backoff::Error::transient)
        })
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;

        let data: TokenPairsResponse = resp.json().await?;
        Ok(data.pairs.unwrap_or_default())
    }

    /// Prefer the pair on the token's own chain with the deepest
    /// liquidity
    fn pick_pair(chain: &str, mut pairs: Vec<DexPair>) -> Option<DexPair> {
        pairs.retain(|p| p.chain_id.eq_ignore_ascii_case(chain) || chain.is_empty());
        pairs.sort_by(|a, b| {
            let la = a.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            let lb = b.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            lb.partial_cmp(&la).unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs.into_iter().next()
    }

    fn pair_to_metrics(chain: &str, address: &str, pair: &DexPair) -> TokenMetrics {
        let mut m = TokenMetrics::new(chain, address);
        m.symbol = pair
            .base_token
            .symbol
            .clone()
            .unwrap_or_else(|| "???".to_string());
        m.name = pair.base_token.name.clone();
        m.price_usd = pair.price_usd.as_ref().and_then(|p| p.parse::<f64>().ok());
        m.price_change_5m = pair.price_change.as_ref().and_then(|pc| pc.m5);
        m.market_cap = pair.market_cap.or(pair.fdv);
        m.liquidity_usd = pair.liquidity.as_ref().and_then(|l| l.usd);
        m.trades_5m = pair
            .txns
            .as_ref()
            .and_then(|t| t.m5.as_ref())
            .map(|m5| m5.buys + m5.sells);
        m.pool_created_at = pair
            .pair_created_at
            .and_then(|ms| DateTime::<Utc>::from_timestamp(ms / 1000, 0));
        m.extra.insert(
            "dex_id".to_string(),
            serde_json::Value::String(pair.dex_id.clone()),
        );
        m
    }
}

#[async_trait]
impl MetricsProvider for DexScreenerProvider {
    async fn fetch_all(&self, chain: &str, address: &str) -> Result<TokenMetrics> {
        let pairs = self.get_token_pairs(address).await?;
        let pair = Self::pick_pair(chain, pairs)
            .ok_or_else(|| Error::Fetch(format!("No pairs found for {} {}", chain, address)))?;
        debug!(
            "DexScreener pair for {}: dex={} liq={:?}",
            address,
            pair.dex_id,
            pair.liquidity.as_ref().and_then(|l| l.usd)
        );
        Ok(Self::pair_to_metrics(chain, address, &pair))
    }

    async fn fetch_chart(&self, _chain: &str, address: &str, _minutes: u32) -> Result<Vec<Bar>> {
        // DexScreener's public API serves no candles. Report the gap
        // rather than faking data; the pipeline tolerates an empty
        // chart and sends text-only.
        warn!("No candle source configured for {}", address);
        Ok(Vec::new())
    }

    async fn fetch_risk_scores(
        &self,
        _metrics: &TokenMetrics,
    ) -> Result<(Option<f64>, Option<f64>)> {
        // Sniffer scores are not served by this source.
        Ok((None, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(chain: &str, liq: f64) -> DexPair {
        DexPair {
            chain_id: chain.to_string(),
            dex_id: "raydium".to_string(),
            pair_address: "pair".to_string(),
            base_token: BaseToken {
                address: "mint".to_string(),
                name: Some("Test Token".to_string()),
                symbol: Some("TEST".to_string()),
            },
            price_usd: Some("0.00123".to_string()),
            price_change: Some(PriceChange {
                m5: Some(4.2),
                h1: None,
                h6: None,
                h24: None,
            }),
            txns: Some(Txns {
                m5: Some(TxnCount { buys: 7, sells: 5 }),
                h1: None,
            }),
            liquidity: Some(Liquidity {
                usd: Some(liq),
                base: None,
                quote: None,
            }),
            market_cap: Some(50_000.0),
            fdv: Some(60_000.0),
            pair_created_at: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_pick_pair_prefers_chain_and_liquidity() {
        let pairs = vec![pair("bsc", 90_000.0), pair("solana", 1_000.0), pair("solana", 8_000.0)];
        let picked = DexScreenerProvider::pick_pair("solana", pairs).unwrap();
        assert_eq!(picked.chain_id, "solana");
        assert_eq!(picked.liquidity.unwrap().usd, Some(8_000.0));
    }

    #[test]
    fn test_pair_to_metrics_mapping() {
        let m = DexScreenerProvider::pair_to_metrics("solana", "mint", &pair("solana", 8_000.0));
        assert_eq!(m.symbol, "TEST");
        assert_eq!(m.price_usd, Some(0.00123));
        assert_eq!(m.market_cap, Some(50_000.0));
        assert_eq!(m.liquidity_usd, Some(8_000.0));
        assert_eq!(m.trades_5m, Some(12));
        assert_eq!(m.price_change_5m, Some(4.2));
        // 1_700_000_000_000 ms -> seconds
        assert_eq!(
            m.pool_created_at.unwrap().timestamp(),
            1_700_000_000
        );
        // DexScreener cannot supply holder data
        assert!(m.holders.is_none());
        assert!(m.top10_ratio.is_none());
    }
}

//! Token metrics snapshot
//!
//! One immutable-ish snapshot of a token's market state at fetch time.
//! The only mutation after construction is the one-shot enrichment of
//! the risk scores once the basic filters have passed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Share of supply held by one address, as a 0..1 fraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderShare {
    pub address: String,
    pub percent: f64,
}

/// Snapshot of one token's market state.
///
/// Ratios (`top10_ratio`, `max_holder_ratio`, `HolderShare::percent`)
/// are stored as fractions: 0.23 means 23%. Providers returning raw
/// percentages must normalize before handing data to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub chain: String,
    pub address: String,
    pub symbol: String,
    pub name: Option<String>,
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub price_change_5m: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub liquidity_usd: Option<f64>,
    #[serde(default)]
    pub pool_created_at: Option<DateTime<Utc>>,
    /// Time of the first candle, the true open time when available
    #[serde(default)]
    pub first_trade_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trades_5m: Option<u32>,
    #[serde(default)]
    pub holders: Option<u32>,
    #[serde(default)]
    pub top10_ratio: Option<f64>,
    #[serde(default)]
    pub max_holder_ratio: Option<f64>,
    /// SolSniffer safety score, 0-100, enriched after basic filters pass
    #[serde(default)]
    pub sol_sniffer_score: Option<f64>,
    /// TokenSniffer safety score, 0-100, enriched after basic filters pass
    #[serde(default)]
    pub token_sniffer_score: Option<f64>,
    #[serde(default)]
    pub top5: Vec<HolderShare>,
    /// Opaque provider metadata
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenMetrics {
    pub fn new(chain: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            address: address.into(),
            symbol: String::new(),
            name: None,
            price_usd: None,
            price_change_5m: None,
            market_cap: None,
            liquidity_usd: None,
            pool_created_at: None,
            first_trade_at: None,
            trades_5m: None,
            holders: None,
            top10_ratio: None,
            max_holder_ratio: None,
            sol_sniffer_score: None,
            token_sniffer_score: None,
            top5: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Best-known open time: first candle time, falling back to pool
    /// creation. An approximation, the sources disagree on the precise
    /// meaning of pool age.
    pub fn effective_open_time(&self) -> Option<DateTime<Utc>> {
        self.first_trade_at.or(self.pool_created_at)
    }

    /// Minutes elapsed since the effective open time
    pub fn open_minutes(&self, now: DateTime<Utc>) -> Option<f64> {
        self.effective_open_time()
            .map(|t| (now - t).num_seconds() as f64 / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_effective_open_time_prefers_first_trade() {
        let now = Utc::now();
        let mut m = TokenMetrics::new("solana", "So11111111111111111111111111111111111111112");
        m.pool_created_at = Some(now - Duration::minutes(120));
        m.first_trade_at = Some(now - Duration::minutes(60));

        assert_eq!(m.effective_open_time(), m.first_trade_at);
        let minutes = m.open_minutes(now).unwrap();
        assert!((minutes - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_open_minutes_falls_back_to_pool_creation() {
        let now = Utc::now();
        let mut m = TokenMetrics::new("solana", "mint");
        assert!(m.open_minutes(now).is_none());

        m.pool_created_at = Some(now - Duration::minutes(30));
        let minutes = m.open_minutes(now).unwrap();
        assert!((minutes - 30.0).abs() < 0.01);
    }
}

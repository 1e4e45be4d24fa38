//! Filter fields and per-task filter configuration
//!
//! The field set is a closed enum so an unknown field name is a parse
//! error at the admin boundary instead of a runtime lookup failure in
//! the hot path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::filter::range::FilterRange;

/// The closed set of filterable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    MarketCapUsd,
    LiquidityUsd,
    OpenMinutes,
    Top10Ratio,
    HolderCount,
    MaxHolderRatio,
    Trades5m,
    SolSnifferScore,
    TokenSnifferScore,
}

impl FilterField {
    pub const ALL: [FilterField; 9] = [
        FilterField::MarketCapUsd,
        FilterField::LiquidityUsd,
        FilterField::OpenMinutes,
        FilterField::Top10Ratio,
        FilterField::HolderCount,
        FilterField::MaxHolderRatio,
        FilterField::Trades5m,
        FilterField::SolSnifferScore,
        FilterField::TokenSnifferScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::MarketCapUsd => "market_cap_usd",
            FilterField::LiquidityUsd => "liquidity_usd",
            FilterField::OpenMinutes => "open_minutes",
            FilterField::Top10Ratio => "top10_ratio",
            FilterField::HolderCount => "holder_count",
            FilterField::MaxHolderRatio => "max_holder_ratio",
            FilterField::Trades5m => "trades_5m",
            FilterField::SolSnifferScore => "sol_sniffer_score",
            FilterField::TokenSnifferScore => "token_sniffer_score",
        }
    }

    /// Ratio fields are entered by admins as 1-100 percentages but
    /// stored as 0..1 fractions
    pub fn is_ratio(&self) -> bool {
        matches!(self, FilterField::Top10Ratio | FilterField::MaxHolderRatio)
    }

    /// Risk-score fields are filled by a separate, rate-limited lookup
    pub fn is_risk_score(&self) -> bool {
        matches!(
            self,
            FilterField::SolSnifferScore | FilterField::TokenSnifferScore
        )
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterField::ALL
            .iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownFilterField(s.to_string()))
    }
}

/// Per-task filter configuration, one optional range per field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub market_cap_usd: FilterRange,
    #[serde(default)]
    pub liquidity_usd: FilterRange,
    #[serde(default)]
    pub open_minutes: FilterRange,
    #[serde(default)]
    pub top10_ratio: FilterRange,
    #[serde(default)]
    pub holder_count: FilterRange,
    #[serde(default)]
    pub max_holder_ratio: FilterRange,
    #[serde(default)]
    pub trades_5m: FilterRange,
    #[serde(default)]
    pub sol_sniffer_score: FilterRange,
    #[serde(default)]
    pub token_sniffer_score: FilterRange,
}

impl FilterConfig {
    pub fn get(&self, field: FilterField) -> FilterRange {
        match field {
            FilterField::MarketCapUsd => self.market_cap_usd,
            FilterField::LiquidityUsd => self.liquidity_usd,
            FilterField::OpenMinutes => self.open_minutes,
            FilterField::Top10Ratio => self.top10_ratio,
            FilterField::HolderCount => self.holder_count,
            FilterField::MaxHolderRatio => self.max_holder_ratio,
            FilterField::Trades5m => self.trades_5m,
            FilterField::SolSnifferScore => self.sol_sniffer_score,
            FilterField::TokenSnifferScore => self.token_sniffer_score,
        }
    }

    pub fn set(&mut self, field: FilterField, range: FilterRange) {
        let slot = match field {
            FilterField::MarketCapUsd => &mut self.market_cap_usd,
            FilterField::LiquidityUsd => &mut self.liquidity_usd,
            FilterField::OpenMinutes => &mut self.open_minutes,
            FilterField::Top10Ratio => &mut self.top10_ratio,
            FilterField::HolderCount => &mut self.holder_count,
            FilterField::MaxHolderRatio => &mut self.max_holder_ratio,
            FilterField::Trades5m => &mut self.trades_5m,
            FilterField::SolSnifferScore => &mut self.sol_sniffer_score,
            FilterField::TokenSnifferScore => &mut self.token_sniffer_score,
        };
        *slot = range;
    }

    /// Count of configured ranges, for status displays
    pub fn configured_count(&self) -> usize {
        FilterField::ALL
            .iter()
            .filter(|f| self.get(**f).is_set())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_fields() {
        for field in FilterField::ALL {
            let parsed: FilterField = field.as_str().parse().unwrap();
            assert_eq!(parsed, field);
        }
    }

    #[test]
    fn test_parse_unknown_field_is_error() {
        let err = "volume_24h".parse::<FilterField>().unwrap_err();
        assert!(matches!(err, Error::UnknownFilterField(name) if name == "volume_24h"));
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut cfg = FilterConfig::default();
        assert_eq!(cfg.configured_count(), 0);

        let range = FilterRange::new(Some(10_000.0), Some(1_000_000.0));
        cfg.set(FilterField::MarketCapUsd, range);
        assert_eq!(cfg.get(FilterField::MarketCapUsd), range);
        assert_eq!(cfg.configured_count(), 1);

        cfg.set(FilterField::MarketCapUsd, FilterRange::default());
        assert_eq!(cfg.configured_count(), 0);
    }

    #[test]
    fn test_serde_field_names_match_wire_names() {
        let json = serde_json::to_string(&FilterField::SolSnifferScore).unwrap();
        assert_eq!(json, "\"sol_sniffer_score\"");
    }

    #[test]
    fn test_config_deserializes_partial_document() {
        let cfg: FilterConfig =
            serde_json::from_str(r#"{"market_cap_usd":{"min":10000.0}}"#).unwrap();
        assert_eq!(cfg.market_cap_usd.min, Some(10_000.0));
        assert!(!cfg.liquidity_usd.is_set());
    }
}

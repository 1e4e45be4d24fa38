//! Two-phase filter evaluation
//!
//! The basic phase covers the cheap, always-available market fields.
//! The risk phase covers externally-fetched sniffer scores and only
//! runs when the basic phase passed, so the rate-limited score lookup
//! is never paid for a token that is already disqualified.

use chrono::{DateTime, Utc};

use crate::filter::fields::{FilterConfig, FilterField};
use crate::filter::range::RangeCheck;
use crate::metrics::TokenMetrics;

/// Filter verdict with all failure reasons collected
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl Evaluation {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            passed: reasons.is_empty(),
            reasons,
        }
    }

    /// AND the verdicts, concatenating reasons
    pub fn and(mut self, other: Evaluation) -> Evaluation {
        self.passed = self.passed && other.passed;
        self.reasons.extend(other.reasons);
        self
    }
}

/// Evaluate the cheap numeric fields. Checks are not short-circuited:
/// every failing field contributes a reason so the rejection message
/// is complete.
pub fn evaluate_basic(metrics: &TokenMetrics, cfg: &FilterConfig, now: DateTime<Utc>) -> Evaluation {
    let mut reasons = Vec::new();

    let checks = [
        (FilterField::MarketCapUsd, metrics.market_cap),
        (FilterField::LiquidityUsd, metrics.liquidity_usd),
        (FilterField::Top10Ratio, metrics.top10_ratio),
        (FilterField::HolderCount, metrics.holders.map(f64::from)),
        (FilterField::MaxHolderRatio, metrics.max_holder_ratio),
        (FilterField::Trades5m, metrics.trades_5m.map(f64::from)),
    ];

    for (field, value) in checks {
        if let RangeCheck::Fail(msg) = cfg.get(field).check(value) {
            reasons.push(format!("{} {}", field, msg));
        }
    }

    // Pool age is derived from the effective open time; a configured
    // age constraint with no known open time is a failure of its own.
    if cfg.open_minutes.is_set() {
        match metrics.open_minutes(now) {
            None => reasons.push("open_minutes missing".to_string()),
            Some(minutes) => {
                if let RangeCheck::Fail(msg) = cfg.open_minutes.check(Some(minutes)) {
                    reasons.push(format!("{} {}", FilterField::OpenMinutes, msg));
                }
            }
        }
    }

    Evaluation::from_reasons(reasons)
}

/// True iff any risk-score range is configured, i.e. the external
/// score lookup is worth paying for
pub fn needs_risk_check(cfg: &FilterConfig) -> bool {
    cfg.sol_sniffer_score.is_set() || cfg.token_sniffer_score.is_set()
}

/// Evaluate the risk-score fields. Unlike the basic phase, a
/// configured range whose metric is still null is skipped rather than
/// failed: an unreachable or rate-limited score provider must not
/// silently reject every token. Only a returned-and-violating score
/// counts.
pub fn evaluate_risk(metrics: &TokenMetrics, cfg: &FilterConfig) -> Evaluation {
    let mut reasons = Vec::new();

    let checks = [
        (FilterField::SolSnifferScore, metrics.sol_sniffer_score),
        (FilterField::TokenSnifferScore, metrics.token_sniffer_score),
    ];

    for (field, value) in checks {
        if value.is_none() {
            continue;
        }
        if let RangeCheck::Fail(msg) = cfg.get(field).check(value) {
            reasons.push(format!("{} {}", field, msg));
        }
    }

    Evaluation::from_reasons(reasons)
}

/// Full evaluation: basic phase, then the risk phase only when the
/// basic phase passed and a risk range is configured. When basic
/// fails, the risk phase is vacuously not evaluated.
pub fn evaluate(metrics: &TokenMetrics, cfg: &FilterConfig, now: DateTime<Utc>) -> Evaluation {
    let basic = evaluate_basic(metrics, cfg, now);
    if !basic.passed || !needs_risk_check(cfg) {
        return basic;
    }
    basic.and(evaluate_risk(metrics, cfg))
}

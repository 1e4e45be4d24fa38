//! Token filtering
//!
//! A filter is a named set of optional numeric ranges applied to a
//! `TokenMetrics` snapshot. Evaluation runs in two phases: cheap basic
//! fields first, then the expensive externally-fetched risk scores
//! only when the basic phase passed.

pub mod evaluator;
pub mod fields;
pub mod range;

pub use evaluator::{evaluate, evaluate_basic, evaluate_risk, needs_risk_check, Evaluation};
pub use fields::{FilterConfig, FilterField};
pub use range::{FilterRange, RangeCheck};

//! CA Sentinel Library
//!
//! Telegram contract-address monitor: extracts CAs from group chatter
//! or scheduled polls, checks them against per-task filter thresholds
//! and pushes passing tokens to configured chats.

pub mod chart;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod format;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod providers;
pub mod schedule;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::TokenMetrics;

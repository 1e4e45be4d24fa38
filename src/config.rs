//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dedupe: DedupeConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token; empty token runs the log-only notifier
    #[serde(default)]
    pub bot_token: String,
    /// User ids allowed to issue admin commands
    #[serde(default)]
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retry_secs")]
    pub max_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_tasks_path")]
    pub tasks_path: String,
    #[serde(default = "default_process_timeout_secs")]
    pub process_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupeConfig {
    #[serde(default = "default_dedupe_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lookback of the candle window, in minutes
    #[serde(default = "default_chart_minutes")]
    pub minutes: u32,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_retry_secs() -> u64 {
    30
}

fn default_tick_secs() -> u64 {
    3
}

fn default_tasks_path() -> String {
    "config/tasks.json".to_string()
}

fn default_process_timeout_secs() -> u64 {
    120
}

fn default_dedupe_ttl_secs() -> u64 {
    900
}

fn default_sweep_secs() -> u64 {
    300
}

fn default_state_path() -> String {
    "state.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chart_minutes() -> u32 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retry_secs: default_max_retry_secs(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            tasks_path: default_tasks_path(),
            process_timeout_secs: default_process_timeout_secs(),
        }
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedupe_ttl_secs(),
            sweep_secs: default_sweep_secs(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            minutes: default_chart_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("provider.timeout_secs", default_timeout_secs() as i64)?
            .set_default("provider.max_retry_secs", default_max_retry_secs() as i64)?
            .set_default("scheduler.tick_secs", default_tick_secs() as i64)?
            .set_default("scheduler.tasks_path", default_tasks_path())?
            .set_default(
                "scheduler.process_timeout_secs",
                default_process_timeout_secs() as i64,
            )?
            .set_default("dedupe.ttl_secs", default_dedupe_ttl_secs() as i64)?
            .set_default("dedupe.sweep_secs", default_sweep_secs() as i64)?
            .set_default("state.path", default_state_path())?
            .set_default("chart.enabled", true)?
            .set_default("chart.minutes", default_chart_minutes() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SENTINEL_)
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.scheduler.tick_secs == 0 {
            anyhow::bail!("scheduler.tick_secs must be positive");
        }

        if self.scheduler.process_timeout_secs == 0 {
            anyhow::bail!("scheduler.process_timeout_secs must be positive");
        }

        if self.dedupe.ttl_secs == 0 {
            anyhow::bail!("dedupe.ttl_secs must be positive");
        }

        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be positive");
        }

        if self.chart.enabled && self.chart.minutes == 0 {
            anyhow::bail!("chart.minutes must be positive when chart is enabled");
        }

        Ok(())
    }

    /// Configuration summary with secrets masked
    pub fn summary(&self) -> String {
        let token = if self.telegram.bot_token.is_empty() {
            "(unset)".to_string()
        } else {
            format!("{}…", &self.telegram.bot_token[..self.telegram.bot_token.len().min(6)])
        };
        format!(
            "telegram.bot_token: {}\n\
             telegram.admin_ids: {:?}\n\
             provider.timeout_secs: {}\n\
             provider.max_retry_secs: {}\n\
             scheduler.tick_secs: {}\n\
             scheduler.tasks_path: {}\n\
             scheduler.process_timeout_secs: {}\n\
             dedupe.ttl_secs: {}\n\
             dedupe.sweep_secs: {}\n\
             state.path: {}\n\
             chart.enabled: {}\n\
             chart.minutes: {}",
            token,
            self.telegram.admin_ids,
            self.provider.timeout_secs,
            self.provider.max_retry_secs,
            self.scheduler.tick_secs,
            self.scheduler.tasks_path,
            self.scheduler.process_timeout_secs,
            self.dedupe.ttl_secs,
            self.dedupe.sweep_secs,
            self.state.path,
            self.chart.enabled,
            self.chart.minutes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load("/nonexistent/config.toml").unwrap();
        assert_eq!(cfg.scheduler.tick_secs, 3);
        assert_eq!(cfg.scheduler.process_timeout_secs, 120);
        assert_eq!(cfg.dedupe.ttl_secs, 900);
        assert_eq!(cfg.dedupe.sweep_secs, 300);
        assert_eq!(cfg.provider.timeout_secs, 15);
        assert!(cfg.chart.enabled);
        assert!(cfg.telegram.bot_token.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[telegram]
bot_token = "123:abc"
admin_ids = [42]

[dedupe]
ttl_secs = 60

[chart]
enabled = false
"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.telegram.bot_token, "123:abc");
        assert_eq!(cfg.telegram.admin_ids, vec![42]);
        assert_eq!(cfg.dedupe.ttl_secs, 60);
        assert!(!cfg.chart.enabled);
        // untouched section keeps defaults
        assert_eq!(cfg.scheduler.tick_secs, 3);
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\ntick_secs = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_summary_masks_token() {
        let mut cfg = Config::load("/nonexistent/config.toml").unwrap();
        cfg.telegram.bot_token = "1234567890:SECRET".to_string();
        let summary = cfg.summary();
        assert!(!summary.contains("SECRET"));
        assert!(summary.contains("123456…"));
    }
}

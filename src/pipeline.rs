//! CA processing pipeline
//!
//! Every trigger source (group message, manual query, scheduled task)
//! produces a `CaJob` on one queue; one orchestrator consumes it:
//! dedupe -> fetch -> basic filter -> (risk fetch -> risk filter) ->
//! render -> notify. Reactive jobs are time-boxed so a stuck upstream
//! call can never pile up unbounded work.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dedupe::{dedupe_key, SeenStore};
use crate::error::{Error, Result};
use crate::filter::{evaluate_basic, evaluate_risk, needs_risk_check, Evaluation};
use crate::format::{format_age, format_int, format_pct, short_num};
use crate::metrics::TokenMetrics;
use crate::providers::telegram::is_bot_target;
use crate::providers::{ChartRenderer, MetricsProvider, Notifier};
use crate::state::StateStore;

/// What produced a job, deciding how results and failures are surfaced
#[derive(Debug, Clone)]
pub enum Trigger {
    /// CA spotted in a monitored group: push on pass, log-only on error
    GroupMessage,
    /// On-demand query: result or error text goes back to the requester
    Manual { reply_to: String },
    /// Scheduler firing: result or failure notice goes to the task's
    /// targets, a maintainer watches that channel for health
    Scheduled {
        task_name: String,
        targets: Vec<String>,
    },
}

/// One unit of work flowing through the system
#[derive(Debug, Clone)]
pub struct CaJob {
    pub chain: String,
    pub ca: String,
    pub task_id: Option<String>,
    pub trigger: Trigger,
}

/// Outcome of a processed CA
#[derive(Debug, Clone)]
pub struct CaReport {
    pub caption: String,
    pub photo: Option<Vec<u8>>,
    pub passed: bool,
    pub reasons: Vec<String>,
}

pub struct Orchestrator {
    provider: Arc<dyn MetricsProvider>,
    renderer: Arc<dyn ChartRenderer>,
    notifier: Arc<dyn Notifier>,
    dedupe: Arc<dyn SeenStore>,
    state: Arc<StateStore>,
    dedupe_ttl: Duration,
    chart_minutes: u32,
    job_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        renderer: Arc<dyn ChartRenderer>,
        notifier: Arc<dyn Notifier>,
        dedupe: Arc<dyn SeenStore>,
        state: Arc<StateStore>,
        dedupe_ttl: Duration,
        chart_minutes: u32,
        job_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            renderer,
            notifier,
            dedupe,
            state,
            dedupe_ttl,
            chart_minutes,
            job_timeout,
        }
    }

    /// Consume the job queue, dispatching each job as detached work so
    /// a slow fetch cannot delay the next job
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<CaJob>) {
        while let Some(job) = rx.recv().await {
            let orch = self.clone();
            tokio::spawn(async move {
                orch.handle_job(job).await;
            });
        }
        info!("Orchestrator queue closed");
    }

    pub async fn handle_job(&self, job: CaJob) {
        match &job.trigger {
            Trigger::GroupMessage => {
                let bounded = tokio::time::timeout(
                    self.job_timeout,
                    self.process_ca(&job.chain, &job.ca, false, job.task_id.as_deref()),
                )
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(self.job_timeout.as_secs())));
                // group-triggered failures never spam a push channel
                if let Err(e) = bounded {
                    if e.is_transient() {
                        warn!("Processing {} {} failed: {}", job.chain, job.ca, e);
                    } else {
                        error!("Processing {} {} failed: {}", job.chain, job.ca, e);
                    }
                }
            }
            Trigger::Manual { reply_to } => {
                match self
                    .process_ca(&job.chain, &job.ca, true, job.task_id.as_deref())
                    .await
                {
                    Ok(Some(report)) => {
                        let text = if report.passed {
                            report.caption.clone()
                        } else {
                            format!(
                                "{}\n\n🚫 Token did not pass the filters:\n{}",
                                report.caption,
                                report
                                    .reasons
                                    .iter()
                                    .map(|r| format!("• {}", escape_html(r)))
                                    .collect::<Vec<_>>()
                                    .join("\n")
                            )
                        };
                        self.send_one(reply_to, &text, report.photo.as_deref()).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.send_one(reply_to, &format!("❌ {}", e), None).await;
                    }
                }
            }
            Trigger::Scheduled { task_name, targets } => {
                match self
                    .process_ca(&job.chain, &job.ca, true, job.task_id.as_deref())
                    .await
                {
                    Ok(Some(report)) => {
                        self.send_to_targets(targets, &report, &job.ca).await;
                        info!(
                            "Task {} delivered to {} target(s)",
                            task_name,
                            targets.len()
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let msg = format!("❌ Task {} failed: {}", task_name, e);
                        for target in targets {
                            self.send_one(target, &msg, None).await;
                        }
                    }
                }
            }
        }
    }

    /// Process one CA end to end. Returns `Ok(None)` when suppressed
    /// by dedupe. `force_push` (manual queries, scheduled runs) skips
    /// dedupe and always yields a report, pass or fail.
    pub async fn process_ca(
        &self,
        chain: &str,
        ca: &str,
        force_push: bool,
        task_id: Option<&str>,
    ) -> Result<Option<CaReport>> {
        let task_in_use = match task_id {
            Some(id) => Some(id.to_string()),
            None => self.state.current_task().await,
        };
        info!(
            "Processing CA: {} {} (task={})",
            chain,
            ca,
            task_in_use.as_deref().unwrap_or("global")
        );

        if !force_push {
            let key = dedupe_key(task_in_use.as_deref(), chain, ca);
            if self.dedupe.seen(&key, self.dedupe_ttl).await {
                info!("Already handled recently, skipping: {}", key);
                return Ok(None);
            }
        }

        // metrics and chart are independent fetches
        let (metrics, bars) = tokio::join!(
            self.provider.fetch_all(chain, ca),
            self.provider.fetch_chart(chain, ca, self.chart_minutes),
        );
        let mut metrics = metrics?;
        let bars = match bars {
            Ok(bars) => bars,
            Err(e) => {
                warn!("Chart fetch failed for {}: {}", ca, e);
                Vec::new()
            }
        };

        let cfg = self.state.filters_cfg(task_in_use.as_deref()).await;
        let now = Utc::now();
        let basic = evaluate_basic(&metrics, &cfg, now);

        // Risk scores are fetched lazily: only when configured and only
        // after the cheap fields already passed.
        let verdict = if basic.passed && needs_risk_check(&cfg) {
            match self.provider.fetch_risk_scores(&metrics).await {
                Ok((sol, token)) => {
                    metrics.sol_sniffer_score = sol;
                    metrics.token_sniffer_score = token;
                }
                // unreachable score source must not reject the token
                Err(e) => warn!("Risk score fetch failed for {}: {}", ca, e),
            }
            basic.and(evaluate_risk(&metrics, &cfg))
        } else {
            basic
        };
        info!(
            "Filter check for {}: {}",
            ca,
            if verdict.passed { "PASSED" } else { "FAILED" }
        );
        if !verdict.reasons.is_empty() {
            debug!("Reasons: {}", verdict.reasons.join(", "));
        }

        let caption = build_caption(&metrics, &verdict);
        let photo = if bars.is_empty() {
            debug!("No chart data for {}, sending text-only", ca);
            None
        } else {
            Some(self.renderer.render(&metrics, &bars)?)
        };

        let report = CaReport {
            caption,
            photo,
            passed: verdict.passed,
            reasons: verdict.reasons,
        };

        // auto mode pushes passing tokens to the task's push targets
        if !force_push && report.passed {
            let targets = self.state.push_chats(task_in_use.as_deref()).await;
            if targets.is_empty() {
                warn!("No push targets configured, dropping alert for {}", ca);
            } else {
                self.send_to_targets(&targets, &report, ca).await;
            }
        }

        Ok(Some(report))
    }

    /// Per-target failures are logged and do not abort the remaining
    /// sends
    async fn send_to_targets(&self, targets: &[String], report: &CaReport, ca: &str) {
        for target in targets {
            // downstream bots want the bare CA, chats the full caption
            let text = if is_bot_target(target) {
                ca
            } else {
                report.caption.as_str()
            };
            self.send_one(target, text, report.photo.as_deref()).await;
        }
    }

    async fn send_one(&self, target: &str, text: &str, photo: Option<&[u8]>) {
        if let Err(e) = self.notifier.send(target, text, photo).await {
            error!("Send failed: {}", e);
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// HTML caption for one token, with the rejection reasons appended
/// when it was filtered out
pub fn build_caption(m: &TokenMetrics, verdict: &Evaluation) -> String {
    let now = Utc::now();
    let chain_path = if m.chain.eq_ignore_ascii_case("solana") {
        "sol".to_string()
    } else {
        m.chain.to_lowercase()
    };
    let gmgn_url = format!("https://gmgn.ai/{}/token/{}", chain_path, m.address);

    let mut lines = vec![
        format!(
            "💊 <b>{}</b> ({})",
            escape_html(&m.symbol),
            escape_html(m.name.as_deref().unwrap_or("Unknown"))
        ),
        format!(
            "💰 MCap: ${} | 💧 Liq: ${} | ⏰ Age: {}",
            short_num(m.market_cap),
            short_num(m.liquidity_usd),
            format_age(m.effective_open_time(), now)
        ),
        format!("<code>{}</code>", m.address),
        format!(
            "👥 Holders: {} | 🔟 Top10: {} | 📉 5m txns: {} | 🐳 Max: {}",
            format_int(m.holders),
            format_pct(m.top10_ratio),
            format_int(m.trades_5m),
            format_pct(m.max_holder_ratio)
        ),
        "-".repeat(20),
        format!("🔗 <a href='{}'>View on GMGN ↗️</a>", gmgn_url),
    ];

    if !verdict.passed {
        lines.push(format!(
            "\n🚫 <b>Filtered:</b> {}",
            escape_html(&verdict.reasons.join(", "))
        ));
    }

    lines.join("\n")
}

//! CLI command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::chart::SvgChartRenderer;
use crate::config::Config;
use crate::dedupe::MemoryDedupe;
use crate::filter::{FilterField, FilterRange};
use crate::monitor::{guess_chain, Monitor};
use crate::pipeline::{CaJob, Orchestrator};
use crate::providers::dexscreener::DexScreenerProvider;
use crate::providers::telegram::{BotApiNotifier, UpdatesPoller};
use crate::providers::{LogNotifier, Notifier};
use crate::schedule::window::{in_window, parse_hhmm};
use crate::schedule::{JsonTaskRepo, TaskRepo, TaskScheduler};
use crate::state::StateStore;

const JOB_QUEUE_CAPACITY: usize = 256;

fn build_notifier(config: &Config, dry_run: bool) -> Arc<dyn Notifier> {
    if dry_run {
        warn!("Running in DRY-RUN mode - notifications are logged, not sent");
        return Arc::new(LogNotifier);
    }
    if config.telegram.bot_token.is_empty() {
        warn!("No bot token configured - notifications are logged, not sent");
        return Arc::new(LogNotifier);
    }
    Arc::new(BotApiNotifier::new(
        config.telegram.bot_token.clone(),
        config.provider.timeout_secs,
    ))
}

async fn build_orchestrator(
    config: &Config,
    notifier: Arc<dyn Notifier>,
) -> Result<(Arc<Orchestrator>, Arc<StateStore>)> {
    let state = Arc::new(StateStore::new(&config.state.path));
    state.load().await?;

    let provider = Arc::new(DexScreenerProvider::new(
        config.provider.timeout_secs,
        config.provider.max_retry_secs,
    ));
    let dedupe = Arc::new(MemoryDedupe::with_sweep_interval(Duration::from_secs(
        config.dedupe.sweep_secs,
    )));
    let chart_minutes = if config.chart.enabled {
        config.chart.minutes
    } else {
        0
    };

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        Arc::new(SvgChartRenderer::new()),
        notifier,
        dedupe,
        state.clone(),
        Duration::from_secs(config.dedupe.ttl_secs),
        chart_minutes,
        Duration::from_secs(config.scheduler.process_timeout_secs),
    ));
    Ok((orchestrator, state))
}

/// Start the sentinel: orchestrator, scheduler and message ingestion
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    info!("Starting CA sentinel...");

    let notifier = build_notifier(config, dry_run);
    let (orchestrator, state) = build_orchestrator(config, notifier).await?;

    let (tx, rx) = mpsc::channel::<CaJob>(JOB_QUEUE_CAPACITY);
    let orch_handle = tokio::spawn(orchestrator.clone().run(rx));

    // Scheduled polling of fixed CAs
    let repo = Arc::new(JsonTaskRepo::new(&config.scheduler.tasks_path));
    let scheduler = Arc::new(TaskScheduler::new(
        repo,
        tx.clone(),
        Some(Duration::from_secs(config.scheduler.tick_secs)),
    ));
    scheduler.load().await?;
    let cancel = scheduler.cancel_token();
    let sched_handle = tokio::spawn(scheduler.clone().run());

    // Reactive ingestion from monitored groups, when a bot token exists
    let ingest_handle = if config.telegram.bot_token.is_empty() {
        warn!("No bot token - group message monitoring disabled");
        None
    } else {
        let monitor = Monitor::new(state.clone(), tx.clone())?;
        let mut poller = UpdatesPoller::new(config.telegram.bot_token.clone());
        let ingest_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            info!("Listening for group messages");
            loop {
                tokio::select! {
                    _ = ingest_cancel.cancelled() => return,
                    polled = poller.poll() => match polled {
                        Ok(messages) => {
                            for msg in messages {
                                monitor.handle_message(msg.chat_id, &msg.text).await;
                            }
                        }
                        Err(e) => {
                            warn!("Update poll failed: {}", e);
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }))
    };

    info!("Sentinel running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    cancel.cancel();
    drop(tx);
    if let Some(handle) = ingest_handle {
        handle.abort();
    }
    if let Err(e) = sched_handle.await {
        error!("Scheduler task panicked: {}", e);
    }
    if let Err(e) = orch_handle.await {
        error!("Orchestrator task panicked: {}", e);
    }
    info!("Stopped");
    Ok(())
}

/// One-shot check of a single CA, printed to stdout
pub async fn check(config: &Config, ca: &str, chain: Option<&str>) -> Result<()> {
    let chain = chain.map(str::to_string).unwrap_or_else(|| guess_chain(ca).to_string());
    info!("Checking {} on {}", ca, chain);

    let (orchestrator, _state) = build_orchestrator(config, Arc::new(LogNotifier)).await?;
    let report = orchestrator
        .process_ca(&chain, ca, true, None)
        .await?
        .ok_or_else(|| anyhow::anyhow!("processing yielded no report"))?;

    println!("{}", report.caption);
    println!();
    if report.passed {
        println!("Verdict: PASSED");
    } else {
        println!("Verdict: FAILED");
        for reason in &report.reasons {
            println!("  - {}", reason);
        }
    }
    Ok(())
}

/// List configured scheduled tasks
pub async fn tasks(config: &Config) -> Result<()> {
    let repo = JsonTaskRepo::new(&config.scheduler.tasks_path);
    let (tx, _rx) = mpsc::channel(1);
    let scheduler = TaskScheduler::new(Arc::new(repo), tx, None);
    scheduler.load().await?;

    let tasks = scheduler.list().await;
    if tasks.is_empty() {
        println!("No tasks configured in {}", config.scheduler.tasks_path);
        return Ok(());
    }
    for task in tasks {
        let window = match (&task.start_time, &task.end_time) {
            (None, None) => "always".to_string(),
            (s, e) => format!(
                "{}-{} ({})",
                s.as_deref().unwrap_or("00:00"),
                e.as_deref().unwrap_or("24:00"),
                if in_window(s.as_deref(), e.as_deref()) {
                    "open"
                } else {
                    "closed"
                }
            ),
        };
        println!(
            "{:<16} {:<8} every {:>3}m  window {:<12} {} target(s)  {}",
            task.id,
            if task.enabled { "enabled" } else { "paused" },
            task.interval_minutes,
            window,
            task.targets.len(),
            task.ca,
        );
    }
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());
    Ok(())
}

async fn open_state(config: &Config) -> Result<Arc<StateStore>> {
    let state = Arc::new(StateStore::new(&config.state.path));
    state.load().await?;
    Ok(state)
}

async fn resolve_task(state: &StateStore, task: Option<&str>) -> Result<String> {
    match task {
        Some(id) => Ok(id.to_string()),
        None => state
            .current_task()
            .await
            .ok_or_else(|| anyhow::anyhow!("no task selected; pass --task or run `select`")),
    }
}

/// Select the task admin commands default to
pub async fn select_task(config: &Config, task: &str) -> Result<()> {
    let state = open_state(config).await?;
    state.ensure_task(task).await?;
    state.set_current_task(task).await?;
    println!("Selected task {}", task);
    Ok(())
}

/// Show the configured filter thresholds of one task
pub async fn filter_show(config: &Config, task: Option<&str>) -> Result<()> {
    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;
    let cfg = state.filters_cfg(Some(&task)).await;

    println!("Filters for {} ({} configured):", task, cfg.configured_count());
    for field in FilterField::ALL {
        let range = cfg.get(field);
        if !range.is_set() {
            continue;
        }
        let show = |bound: Option<f64>| match bound {
            // ratio fields are shown the way they are entered: percent
            Some(v) if field.is_ratio() => format!("{}", v * 100.0),
            Some(v) => format!("{}", v),
            None => "-".to_string(),
        };
        println!("  {:<20} min {:>10}  max {:>10}", field, show(range.min), show(range.max));
    }
    Ok(())
}

/// Set one filter range. Ratio fields are entered as 1-100 percents
/// and stored as fractions.
pub async fn filter_set(
    config: &Config,
    task: Option<&str>,
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<()> {
    let field: FilterField = field.parse()?;
    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;

    let scale = |bound: Option<f64>| {
        if field.is_ratio() {
            bound.map(|v| v / 100.0)
        } else {
            bound
        }
    };
    let range = FilterRange::new(scale(min), scale(max));

    state.ensure_task(&task).await?;
    state.set_filter(&task, field, range).await?;
    if range.is_set() {
        println!("{}: set {}", task, field);
    } else {
        println!("{}: cleared {}", task, field);
    }
    Ok(())
}

/// Set or clear a scheduled task's daily time window (HH:MM, reference
/// UTC+8). Written through the task repo so a running scheduler picks
/// it up on the next reload.
pub async fn set_window(
    config: &Config,
    task: Option<&str>,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    for bound in [&start, &end].into_iter().flatten() {
        if parse_hhmm(bound).is_none() {
            anyhow::bail!("invalid time '{}', expected HH:MM", bound);
        }
    }

    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;

    let repo = JsonTaskRepo::new(&config.scheduler.tasks_path);
    let mut tasks = repo.load().await?;
    let entry = tasks.iter_mut().find(|t| t.id == task).ok_or_else(|| {
        anyhow::anyhow!(
            "no scheduled task '{}' in {}",
            task,
            config.scheduler.tasks_path
        )
    })?;
    entry.start_time = start.clone();
    entry.end_time = end.clone();
    repo.save(&tasks).await?;

    println!(
        "{}: window {} - {}",
        task,
        start.as_deref().unwrap_or("-"),
        end.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Enable or disable a task's group-message listening
pub async fn set_enabled(config: &Config, task: Option<&str>, enabled: bool) -> Result<()> {
    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;
    state.ensure_task(&task).await?;
    state.set_task_enabled(&task, enabled).await?;
    println!(
        "{}: {}",
        task,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Add a chat to listen on for CAs
pub async fn add_listen(config: &Config, task: Option<&str>, chat_id: i64) -> Result<()> {
    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;
    state.ensure_task(&task).await?;
    state.add_listen(&task, chat_id).await?;
    println!("{}: listening on {}", task, chat_id);
    Ok(())
}

/// Add a push target (chat id or @botname)
pub async fn add_push(config: &Config, task: Option<&str>, target: String) -> Result<()> {
    let state = open_state(config).await?;
    let task = resolve_task(&state, task).await?;
    state.ensure_task(&task).await?;
    state.add_push(&task, target.clone()).await?;
    println!("{}: pushing to {}", task, target);
    Ok(())
}

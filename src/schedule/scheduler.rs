//! Recurring task scheduler
//!
//! A single tick loop walks the task list every few seconds: windowed
//! tasks are auto-paused outside their daily window and auto-resumed
//! inside it, due tasks are dispatched onto the orchestrator queue.
//! `next_run` is advanced BEFORE dispatch, so a slow run can never
//! cause a second concurrent trigger of the same task.

use chrono::{TimeZone, Timelike, Utc};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::{CaJob, Trigger};
use crate::schedule::task::{sanitize_tasks, Task, TaskRepo};
use crate::schedule::window::{in_window_at, next_window_open, reference_offset};

const DEFAULT_TICK: Duration = Duration::from_secs(3);

pub struct TaskScheduler {
    tasks: RwLock<Vec<Task>>,
    repo: Arc<dyn TaskRepo>,
    tx: mpsc::Sender<CaJob>,
    tick: Duration,
    cancel: CancellationToken,
    last_modified: Mutex<Option<SystemTime>>,
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Minutes since midnight of the reference clock at a given epoch
fn reference_minutes(now_epoch: u64) -> u32 {
    let tz = reference_offset();
    let dt = tz
        .timestamp_opt(now_epoch as i64, 0)
        .single()
        .unwrap_or_else(|| Utc::now().with_timezone(&tz));
    dt.hour() * 60 + dt.minute()
}

impl TaskScheduler {
    pub fn new(repo: Arc<dyn TaskRepo>, tx: mpsc::Sender<CaJob>, tick: Option<Duration>) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            repo,
            tx,
            tick: tick.unwrap_or(DEFAULT_TICK),
            cancel: CancellationToken::new(),
            last_modified: Mutex::new(None),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load tasks from the repo, dropping invalid entries
    pub async fn load(&self) -> Result<()> {
        let tasks = sanitize_tasks(self.repo.load().await?);
        *self.tasks.write().await = tasks;
        *self.last_modified.lock().await = self.repo.modified_at().await?;
        Ok(())
    }

    /// Main loop. Returns when the cancel token fires.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("Scheduler running, tick every {:?}", self.tick);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.maybe_reload().await {
                        warn!("Task file reload failed: {}", e);
                    }
                    self.tick_once(now_epoch()).await;
                }
            }
        }
    }

    /// One scheduler pass at an explicit instant
    pub async fn tick_once(&self, now: u64) {
        let minutes = reference_minutes(now);
        let mut due = Vec::new();
        let mut dirty = false;

        {
            let mut tasks = self.tasks.write().await;
            for task in tasks.iter_mut() {
                if task.has_window() {
                    let inside =
                        in_window_at(task.start_time.as_deref(), task.end_time.as_deref(), minutes);
                    if task.enabled && !inside {
                        task.enabled = false;
                        task.next_run = next_window_open(task.start_time.as_deref(), now);
                        info!(
                            "Task {} left its window, paused until {}",
                            task.id, task.next_run
                        );
                        dirty = true;
                        continue;
                    }
                    if !task.enabled && inside {
                        task.enabled = true;
                        task.next_run = now;
                        info!("Task {} entered its window, resumed", task.id);
                        dirty = true;
                    }
                }

                if !task.enabled || task.next_run > now {
                    continue;
                }

                // advance before dispatch: at most one in-flight run
                task.next_run = now + u64::from(task.interval_minutes) * 60;
                dirty = true;
                due.push(CaJob {
                    chain: task.chain.clone(),
                    ca: task.ca.clone(),
                    task_id: Some(task.id.clone()),
                    trigger: Trigger::Scheduled {
                        task_name: if task.name.is_empty() {
                            task.id.clone()
                        } else {
                            task.name.clone()
                        },
                        targets: task.targets.clone(),
                    },
                });
            }
        }

        if dirty {
            if let Err(e) = self.persist().await {
                error!("Persisting task state failed: {}", e);
            }
        }
        for job in due {
            if self.tx.send(job).await.is_err() {
                warn!("Orchestrator queue closed, dropping scheduled job");
                return;
            }
        }
    }

    /// Re-read the task file when its mtime moved, keeping in-memory
    /// `next_run` for ids that survive the edit
    async fn maybe_reload(&self) -> Result<()> {
        let modified = self.repo.modified_at().await?;
        let mut last = self.last_modified.lock().await;
        if modified == *last {
            return Ok(());
        }
        *last = modified;
        drop(last);

        let fresh = sanitize_tasks(self.repo.load().await?);
        let mut tasks = self.tasks.write().await;
        let merged: Vec<Task> = fresh
            .into_iter()
            .map(|mut t| {
                if let Some(old) = tasks.iter().find(|o| o.id == t.id) {
                    t.next_run = old.next_run;
                }
                t
            })
            .collect();
        info!("Task file changed, {} task(s) active", merged.len());
        *tasks = merged;
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let tasks = self.tasks.read().await;
        self.repo.save(&tasks).await?;
        drop(tasks);
        // our own write must not look like an external edit
        *self.last_modified.lock().await = self.repo.modified_at().await?;
        Ok(())
    }

    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn add_task(&self, task: Task) -> Result<()> {
        task.validate()?;
        {
            let mut tasks = self.tasks.write().await;
            if tasks.iter().any(|t| t.id == task.id) {
                return Err(Error::InvalidTask(format!(
                    "task {} already exists",
                    task.id
                )));
            }
            tasks.push(task);
        }
        self.persist().await
    }

    pub async fn remove_task(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            tasks.len() != before
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn pause(&self, id: &str) -> Result<bool> {
        let found = {
            let mut tasks = self.tasks.write().await;
            match tasks.iter_mut().find(|t| t.id == id) {
                Some(t) => {
                    t.enabled = false;
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist().await?;
        }
        Ok(found)
    }

    /// Resuming makes the task due immediately
    pub async fn resume(&self, id: &str) -> Result<bool> {
        let found = {
            let mut tasks = self.tasks.write().await;
            match tasks.iter_mut().find(|t| t.id == id) {
                Some(t) => {
                    t.enabled = true;
                    t.next_run = now_epoch();
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist().await?;
        }
        Ok(found)
    }
}

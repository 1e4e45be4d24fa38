//! Task entity and durable task configuration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::error::{Error, Result};

fn default_chain() -> String {
    "solana".to_string()
}

fn default_interval() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// One recurring scheduled check of a fixed contract address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Sending-client affinity key
    pub client: String,
    #[serde(default = "default_chain")]
    pub chain: String,
    pub ca: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval_minutes: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Epoch second of the next due time; 0 means "due now"
    #[serde(default)]
    pub next_run: u64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Task {
    /// id, client and ca are mandatory; interval must be positive
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidTask("missing id".to_string()));
        }
        if self.client.is_empty() {
            return Err(Error::InvalidTask(format!("task {}: missing client", self.id)));
        }
        if self.ca.is_empty() {
            return Err(Error::InvalidTask(format!("task {}: missing ca", self.id)));
        }
        if self.interval_minutes == 0 {
            return Err(Error::InvalidTask(format!(
                "task {}: interval_minutes must be > 0",
                self.id
            )));
        }
        Ok(())
    }

    pub fn has_window(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Durable task configuration behind a trait so the scheduler can be
/// tested against an in-memory fake
#[async_trait]
pub trait TaskRepo: Send + Sync {
    async fn load(&self) -> Result<Vec<Task>>;
    async fn save(&self, tasks: &[Task]) -> Result<()>;
    /// Last modification time of the backing store, for hot reload
    async fn modified_at(&self) -> Result<Option<SystemTime>>;
}

/// JSON-file task store (`{"tasks": [...]}`)
pub struct JsonTaskRepo {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TasksDoc {
    #[serde(default)]
    tasks: Vec<Task>,
}

impl JsonTaskRepo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TaskRepo for JsonTaskRepo {
    async fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::State(e.to_string()))?;
        let doc: TasksDoc =
            serde_json::from_str(&data).map_err(|e| Error::State(e.to_string()))?;
        Ok(doc.tasks)
    }

    async fn save(&self, tasks: &[Task]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::State(e.to_string()))?;
        }
        let doc = TasksDoc {
            tasks: tasks.to_vec(),
        };
        let data =
            serde_json::to_string_pretty(&doc).map_err(|e| Error::State(e.to_string()))?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| Error::State(e.to_string()))?;
        Ok(())
    }

    async fn modified_at(&self) -> Result<Option<SystemTime>> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(_) => Ok(None),
        }
    }
}

/// Validate a loaded task list: invalid entries are skipped with a
/// warning, never fatal to the whole load
pub fn sanitize_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut valid = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.validate() {
            Ok(()) => valid.push(task),
            Err(e) => warn!("Skipping invalid task config: {}", e),
        }
    }
    if valid.is_empty() {
        info!("No tasks loaded");
    } else {
        info!("Loaded {} task(s)", valid.len());
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            client: "main".to_string(),
            chain: "solana".to_string(),
            ca: "Mint11111111111111111111111111111111111111".to_string(),
            targets: vec!["@pushbot".to_string()],
            interval_minutes: 5,
            enabled: true,
            next_run: 0,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn test_validate_requires_id_client_ca() {
        assert!(task("t1").validate().is_ok());

        let mut t = task("t1");
        t.client = String::new();
        assert!(matches!(t.validate(), Err(Error::InvalidTask(_))));

        let mut t = task("t1");
        t.ca = String::new();
        assert!(t.validate().is_err());

        let mut t = task("");
        t.id = String::new();
        assert!(t.validate().is_err());

        let mut t = task("t1");
        t.interval_minutes = 0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_sanitize_skips_invalid_not_fatal() {
        let mut bad = task("bad");
        bad.ca = String::new();
        let valid = sanitize_tasks(vec![task("a"), bad, task("b")]);
        let ids: Vec<_> = valid.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_json_repo_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let repo = JsonTaskRepo::new(&path);

        assert!(repo.load().await.unwrap().is_empty());
        assert!(repo.modified_at().await.unwrap().is_none());

        let tasks = vec![task("a"), task("b")];
        repo.save(&tasks).await.unwrap();
        assert!(repo.modified_at().await.unwrap().is_some());

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "a");
        assert_eq!(loaded[1].interval_minutes, 5);
    }

    #[test]
    fn test_deserialize_defaults() {
        let t: Task = serde_json::from_str(
            r#"{"id":"x","client":"main","ca":"Mint"}"#,
        )
        .unwrap();
        assert_eq!(t.chain, "solana");
        assert_eq!(t.interval_minutes, 5);
        assert!(t.enabled);
        assert_eq!(t.next_run, 0);
        assert!(t.targets.is_empty());
    }
}

//! Durable admin state
//!
//! One JSON document holding the current task selection and, per task,
//! the listen/push chat lists and filter thresholds for the reactive
//! pipeline. Scheduled-task definitions (interval, time window) live
//! in the task repo, not here. Older flat documents (pre-multi-task)
//! are migrated into a single synthesized "default" task on load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::filter::{FilterConfig, FilterField, FilterRange};

fn default_true() -> bool {
    true
}

/// Per-task admin-configurable settings for the reactive pipeline.
/// `enabled` gates group-message listening; a disabled task's chats
/// drop out of the listen map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub listen_chats: Vec<i64>,
    #[serde(default)]
    pub push_chats: Vec<String>,
    #[serde(default)]
    pub filters: FilterConfig,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_chats: Vec::new(),
            push_chats: Vec::new(),
            filters: FilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateDoc {
    #[serde(default)]
    current_task: Option<String>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskSettings>,
    // Legacy flat layout, consumed by migration only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    listen_chats: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    push_chats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filters: Option<FilterConfig>,
}

impl StateDoc {
    /// Fold legacy top-level chats/filters into a "default" task
    fn migrate(&mut self) -> bool {
        let has_legacy = !self.listen_chats.is_empty()
            || !self.push_chats.is_empty()
            || self.filters.is_some();
        if !has_legacy || !self.tasks.is_empty() {
            self.listen_chats.clear();
            self.push_chats.clear();
            self.filters = None;
            return false;
        }
        let settings = TaskSettings {
            enabled: true,
            listen_chats: std::mem::take(&mut self.listen_chats),
            push_chats: std::mem::take(&mut self.push_chats),
            filters: self.filters.take().unwrap_or_default(),
        };
        self.tasks.insert("default".to_string(), settings);
        if self.current_task.is_none() {
            self.current_task = Some("default".to_string());
        }
        true
    }
}

/// Admin state store. Readers get consistent snapshots (copy-on-read),
/// writers persist before releasing the lock.
pub struct StateStore {
    path: PathBuf,
    doc: RwLock<StateDoc>,
}

impl StateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            doc: RwLock::new(StateDoc::default()),
        }
    }

    pub async fn load(self: &Arc<Self>) -> Result<()> {
        if !self.path.exists() {
            info!("No existing state at {}, starting fresh", self.path.display());
            return Ok(());
        }
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::State(e.to_string()))?;
        let mut loaded: StateDoc = match serde_json::from_str(&data) {
            Ok(doc) => doc,
            Err(e) => {
                // corrupt state keeps defaults rather than refusing to boot
                warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                return Ok(());
            }
        };
        if loaded.migrate() {
            info!("Migrated legacy flat state into task 'default'");
        }
        let mut doc = self.doc.write().await;
        *doc = loaded;
        Ok(())
    }

    async fn write_locked(&self, doc: &StateDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::State(e.to_string()))?;
        }
        let data =
            serde_json::to_string_pretty(doc).map_err(|e| Error::State(e.to_string()))?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| Error::State(e.to_string()))?;
        Ok(())
    }

    pub async fn current_task(&self) -> Option<String> {
        self.doc.read().await.current_task.clone()
    }

    pub async fn set_current_task(&self, task_id: &str) -> Result<()> {
        let mut doc = self.doc.write().await;
        doc.current_task = Some(task_id.to_string());
        self.write_locked(&doc).await
    }

    pub async fn task_settings(&self, task_id: &str) -> Option<TaskSettings> {
        self.doc.read().await.tasks.get(task_id).cloned()
    }

    pub async fn task_ids(&self) -> Vec<String> {
        self.doc.read().await.tasks.keys().cloned().collect()
    }

    /// Create the task entry if absent, selecting it when nothing is
    /// selected yet
    pub async fn ensure_task(&self, task_id: &str) -> Result<()> {
        let mut doc = self.doc.write().await;
        doc.tasks
            .entry(task_id.to_string())
            .or_insert_with(TaskSettings::default);
        if doc.current_task.is_none() {
            doc.current_task = Some(task_id.to_string());
        }
        self.write_locked(&doc).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<bool> {
        let mut doc = self.doc.write().await;
        let removed = doc.tasks.remove(task_id).is_some();
        if removed {
            if doc.current_task.as_deref() == Some(task_id) {
                doc.current_task = doc.tasks.keys().next().cloned();
            }
            self.write_locked(&doc).await?;
        }
        Ok(removed)
    }

    pub async fn set_task_enabled(&self, task_id: &str, enabled: bool) -> Result<bool> {
        let mut doc = self.doc.write().await;
        let Some(settings) = doc.tasks.get_mut(task_id) else {
            return Ok(false);
        };
        settings.enabled = enabled;
        self.write_locked(&doc).await?;
        Ok(true)
    }

    /// Set one filter range. The field name is validated against the
    /// closed `FilterField` set before this is reachable.
    pub async fn set_filter(
        &self,
        task_id: &str,
        field: FilterField,
        range: FilterRange,
    ) -> Result<bool> {
        let mut doc = self.doc.write().await;
        let Some(settings) = doc.tasks.get_mut(task_id) else {
            return Ok(false);
        };
        settings.filters.set(field, range);
        self.write_locked(&doc).await?;
        Ok(true)
    }

    /// Consistent filter snapshot for one evaluation. Falls back to
    /// the current task, then to an empty config.
    pub async fn filters_cfg(&self, task_id: Option<&str>) -> FilterConfig {
        let doc = self.doc.read().await;
        let id = task_id
            .map(str::to_string)
            .or_else(|| doc.current_task.clone());
        id.and_then(|id| doc.tasks.get(&id))
            .map(|s| s.filters.clone())
            .unwrap_or_default()
    }

    pub async fn push_chats(&self, task_id: Option<&str>) -> Vec<String> {
        let doc = self.doc.read().await;
        let id = task_id
            .map(str::to_string)
            .or_else(|| doc.current_task.clone());
        id.and_then(|id| doc.tasks.get(&id))
            .map(|s| s.push_chats.clone())
            .unwrap_or_default()
    }

    pub async fn add_push(&self, task_id: &str, target: String) -> Result<bool> {
        let mut doc = self.doc.write().await;
        let Some(settings) = doc.tasks.get_mut(task_id) else {
            return Ok(false);
        };
        if !settings.push_chats.contains(&target) {
            settings.push_chats.push(target);
        }
        self.write_locked(&doc).await?;
        Ok(true)
    }

    pub async fn add_listen(&self, task_id: &str, chat_id: i64) -> Result<bool> {
        let mut doc = self.doc.write().await;
        let Some(settings) = doc.tasks.get_mut(task_id) else {
            return Ok(false);
        };
        if !settings.listen_chats.contains(&chat_id) {
            settings.listen_chats.push(chat_id);
        }
        self.write_locked(&doc).await?;
        Ok(true)
    }

    /// All chat ids the enabled tasks listen on, with the owning task
    /// id. A disabled task stops producing reactive jobs.
    pub async fn listen_map(&self) -> Vec<(i64, String)> {
        let doc = self.doc.read().await;
        let mut out = Vec::new();
        for (id, settings) in &doc.tasks {
            if !settings.enabled {
                continue;
            }
            for chat in &settings.listen_chats {
                out.push((*chat, id.clone()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> Arc<StateStore> {
        Arc::new(StateStore::new(dir.path().join("state.json")))
    }

    #[tokio::test]
    async fn test_fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.load().await.unwrap();
        assert!(s.current_task().await.is_none());
        assert!(s.task_ids().await.is_empty());
        assert_eq!(s.filters_cfg(None).await, FilterConfig::default());
    }

    #[tokio::test]
    async fn test_set_filter_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.ensure_task("t1").await.unwrap();
        let range = FilterRange::new(Some(10_000.0), None);
        assert!(s
            .set_filter("t1", FilterField::MarketCapUsd, range)
            .await
            .unwrap());

        let reloaded = store(&dir);
        reloaded.load().await.unwrap();
        let cfg = reloaded.filters_cfg(Some("t1")).await;
        assert_eq!(cfg.market_cap_usd, range);
        assert_eq!(reloaded.current_task().await.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_mutations_on_missing_task_return_false() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        assert!(!s.set_task_enabled("ghost", false).await.unwrap());
        assert!(!s
            .set_filter("ghost", FilterField::Trades5m, FilterRange::default())
            .await
            .unwrap());
        assert!(!s.delete_task("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_document_migration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(
            &path,
            r#"{
                "listen_chats": [-100123],
                "push_chats": ["@pushbot"],
                "filters": {"market_cap_usd": {"min": 5000.0}}
            }"#,
        )
        .await
        .unwrap();

        let s = Arc::new(StateStore::new(&path));
        s.load().await.unwrap();

        assert_eq!(s.current_task().await.as_deref(), Some("default"));
        let settings = s.task_settings("default").await.unwrap();
        assert_eq!(settings.listen_chats, vec![-100123]);
        assert_eq!(settings.push_chats, vec!["@pushbot".to_string()]);
        assert_eq!(settings.filters.market_cap_usd.min, Some(5_000.0));
    }

    #[tokio::test]
    async fn test_corrupt_state_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let s = Arc::new(StateStore::new(&path));
        s.load().await.unwrap();
        assert!(s.task_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_task_moves_selection() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.ensure_task("a").await.unwrap();
        s.ensure_task("b").await.unwrap();
        assert_eq!(s.current_task().await.as_deref(), Some("a"));

        assert!(s.delete_task("a").await.unwrap());
        assert_eq!(s.current_task().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_listen_map_spans_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.ensure_task("a").await.unwrap();
        s.ensure_task("b").await.unwrap();
        s.add_listen("a", -1).await.unwrap();
        s.add_listen("b", -2).await.unwrap();

        let map = s.listen_map().await;
        assert_eq!(map.len(), 2);
        assert!(map.contains(&(-1, "a".to_string())));
        assert!(map.contains(&(-2, "b".to_string())));
    }

    #[tokio::test]
    async fn test_disabled_task_leaves_listen_map() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        s.ensure_task("a").await.unwrap();
        s.ensure_task("b").await.unwrap();
        s.add_listen("a", -1).await.unwrap();
        s.add_listen("b", -2).await.unwrap();

        assert!(s.set_task_enabled("a", false).await.unwrap());
        let map = s.listen_map().await;
        assert_eq!(map, vec![(-2, "b".to_string())]);

        assert!(s.set_task_enabled("a", true).await.unwrap());
        assert_eq!(s.listen_map().await.len(), 2);
    }
}

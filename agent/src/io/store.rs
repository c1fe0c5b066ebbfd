//! Checklist persistence under the configured storage root.
//!
//! Artifacts are keyed by thread: `<storage_dir>/<thread_id>/checklist.json`
//! holds the latest finalized package (atomic temp-file-then-rename write),
//! and `tracking.log` accumulates one line per tracking event. The engine
//! calls this after finalization and on tracking updates; everything else in
//! the loop runs without touching disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::core::memory::TrackingUpdate;
use crate::core::state::ChecklistPackage;

/// Store rooted at a storage directory, scoped to one thread key.
#[derive(Debug, Clone)]
pub struct ChecklistStore {
    thread_dir: PathBuf,
}

impl ChecklistStore {
    pub fn new(storage_dir: &Path, thread_id: &str) -> Self {
        Self {
            thread_dir: storage_dir.join(thread_id),
        }
    }

    pub fn checklist_path(&self) -> PathBuf {
        self.thread_dir.join("checklist.json")
    }

    pub fn tracking_log_path(&self) -> PathBuf {
        self.thread_dir.join("tracking.log")
    }

    /// Atomically write the current package (temp file + rename).
    pub fn write_package(&self, package: &ChecklistPackage) -> Result<()> {
        fs::create_dir_all(&self.thread_dir)
            .with_context(|| format!("create thread dir {}", self.thread_dir.display()))?;
        let path = self.checklist_path();
        let mut buf = serde_json::to_string_pretty(package).context("serialize checklist")?;
        buf.push('\n');
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("write temp checklist {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replace checklist {}", path.display()))?;
        debug!(path = %path.display(), "checklist written");
        Ok(())
    }

    /// Read the persisted package back, `None` when nothing was written yet.
    pub fn read_package(&self) -> Result<Option<ChecklistPackage>> {
        let path = self.checklist_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let package = serde_json::from_str(&contents)
            .with_context(|| format!("parse checklist {}", path.display()))?;
        Ok(Some(package))
    }

    /// Append one tracking event line.
    pub fn append_tracking(&self, update: &TrackingUpdate) -> Result<()> {
        fs::create_dir_all(&self.thread_dir)
            .with_context(|| format!("create thread dir {}", self.thread_dir.display()))?;
        let path = self.tracking_log_path();
        let flag = if update.completed { "complete" } else { "open" };
        let line = format!(
            "{} item={} marked={} open={} total={}\n",
            Utc::now().to_rfc3339(),
            update.identifier,
            flag,
            update.open_items,
            update.total_items
        );
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open tracking log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append tracking log {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{ChecklistItem, ChecklistSection};

    fn sample_package() -> ChecklistPackage {
        ChecklistPackage {
            sections: vec![ChecklistSection {
                name: "Preparation".to_string(),
                objective: "Everything staged".to_string(),
                items: vec![ChecklistItem {
                    identifier: "1.1".to_string(),
                    title: "Inventory schemas".to_string(),
                    description: "List every table in scope.".to_string(),
                    sub_steps: Vec::new(),
                    acceptance_criteria: Vec::new(),
                    prerequisites: Vec::new(),
                    completed: false,
                    metadata: serde_json::Map::new(),
                }],
            }],
            notes: vec!["run during low traffic".to_string()],
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ChecklistStore::new(temp.path(), "thread-1");
        let package = sample_package();

        store.write_package(&package).expect("write");
        let loaded = store.read_package().expect("read").expect("present");
        assert_eq!(loaded, package);
        assert!(temp.path().join("thread-1/checklist.json").is_file());
    }

    #[test]
    fn read_missing_returns_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ChecklistStore::new(temp.path(), "thread-1");
        assert!(store.read_package().expect("read").is_none());
    }

    #[test]
    fn tracking_events_append_one_line_each() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ChecklistStore::new(temp.path(), "thread-1");
        let update = TrackingUpdate {
            identifier: "1.1".to_string(),
            completed: true,
            open_items: 0,
            total_items: 1,
        };
        store.append_tracking(&update).expect("append");
        store.append_tracking(&update).expect("append");

        let log = fs::read_to_string(store.tracking_log_path()).expect("read log");
        assert_eq!(log.lines().count(), 2);
        assert!(log.contains("item=1.1 marked=complete open=0 total=1"));
    }

    /// Threads never share files: two stores under one root stay disjoint.
    #[test]
    fn threads_are_isolated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store_a = ChecklistStore::new(temp.path(), "a");
        let store_b = ChecklistStore::new(temp.path(), "b");
        store_a.write_package(&sample_package()).expect("write");
        assert!(store_b.read_package().expect("read").is_none());
    }
}

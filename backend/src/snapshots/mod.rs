//! Snapshot store - persist each stage's output for later inspection
//!
//! One directory per run, one JSON file per stage:
//!
//! ```text
//! .layoffs/snapshots/
//!   layoffs-1700000000000-1a2b3c4d/
//!     run.json
//!     01-dedup.json
//!     02-normalize.json
//!     03-resolve_nulls.json
//!     04-finalize.json
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SnapshotError, SnapshotResult};
use crate::transform::{PipelineStage, SnapshotSink};

/// Directory where snapshots are stored (relative to current dir)
pub const DEFAULT_SNAPSHOT_DIR: &str = ".layoffs/snapshots";

const MANIFEST: &str = "run.json";

/// One stage's output for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub run_id: String,
    pub stage: PipelineStage,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    pub row_count: usize,
    pub rows: Value,
}

/// Run metadata, written when the run starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub run_id: String,
    /// Input name the run was started for
    pub label: String,
    pub created_at: String,
    /// Stages with a snapshot on disk, in pipeline order
    #[serde(default)]
    pub stages: Vec<PipelineStage>,
}

/// Store rooted at one directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Store under [`DEFAULT_SNAPSHOT_DIR`]
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_SNAPSHOT_DIR)
    }

    /// Store with a custom root directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            root: dir.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the run directory and its manifest.
    pub fn begin_run(&self, label: &str) -> SnapshotResult<RunRecorder> {
        let run_id = generate_run_id(label);
        let dir = self.root.join(&run_id);
        fs::create_dir_all(&dir)?;

        let info = RunInfo {
            run_id: run_id.clone(),
            label: label.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            stages: Vec::new(),
        };
        fs::write(dir.join(MANIFEST), serde_json::to_string_pretty(&info)?)?;

        Ok(RunRecorder { dir, run_id })
    }

    /// All runs, oldest first. Directories without a readable manifest are
    /// skipped.
    pub fn list_runs(&self) -> SnapshotResult<Vec<RunInfo>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            let Ok(content) = fs::read_to_string(path.join(MANIFEST)) else {
                continue;
            };
            let Ok(mut info) = serde_json::from_str::<RunInfo>(&content) else {
                continue;
            };
            info.stages = PipelineStage::ALL
                .into_iter()
                .filter(|stage| path.join(file_name(*stage)).exists())
                .collect();
            runs.push(info);
        }

        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }

    /// Load one stage snapshot.
    pub fn load(&self, run_id: &str, stage: PipelineStage) -> SnapshotResult<StoredSnapshot> {
        let path = self.run_dir(run_id)?.join(file_name(stage));
        if !path.exists() {
            return Err(SnapshotError::NotFound(format!("{} / {}", run_id, stage.slug())));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Delete a run and all its snapshots.
    pub fn delete_run(&self, run_id: &str) -> SnapshotResult<()> {
        let dir = self.run_dir(run_id)?;
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    fn run_dir(&self, run_id: &str) -> SnapshotResult<PathBuf> {
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let dir = self.root.join(run_id);
        if valid && dir.is_dir() {
            Ok(dir)
        } else {
            Err(SnapshotError::NotFound(run_id.to_string()))
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the snapshots of one run
#[derive(Debug)]
pub struct RunRecorder {
    dir: PathBuf,
    run_id: String,
}

impl RunRecorder {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl SnapshotSink for RunRecorder {
    fn record(&mut self, stage: PipelineStage, rows: &Value) -> Result<(), SnapshotError> {
        let snapshot = StoredSnapshot {
            run_id: self.run_id.clone(),
            stage,
            created_at: chrono::Utc::now().to_rfc3339(),
            row_count: rows.as_array().map_or(0, Vec::len),
            rows: rows.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(self.dir.join(file_name(stage)), content)?;
        Ok(())
    }
}

fn file_name(stage: PipelineStage) -> String {
    format!("{:02}-{}.json", stage.position(), stage.slug())
}

/// Slug of the label, a millisecond timestamp and a random suffix.
fn generate_run_id(label: &str) -> String {
    let slug = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "run".to_string() } else { slug };

    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", slug, timestamp, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::with_dir(dir.path());

        let mut recorder = store.begin_run("Layoffs 2023.csv").unwrap();
        let rows = json!([{ "company": "Casper" }, { "company": "Oda" }]);
        recorder.record(PipelineStage::Dedup, &rows).unwrap();
        recorder.record(PipelineStage::Normalize, &rows).unwrap();

        let run_id = recorder.run_id().to_string();
        assert!(run_id.starts_with("layoffs-2023-csv-"));

        let snapshot = store.load(&run_id, PipelineStage::Normalize).unwrap();
        assert_eq!(snapshot.row_count, 2);
        assert_eq!(snapshot.rows, rows);
        assert_eq!(snapshot.stage, PipelineStage::Normalize);
        assert!(dir.path().join(&run_id).join("02-normalize.json").exists());
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::with_dir(dir.path());
        assert!(store.list_runs().unwrap().is_empty());

        let mut recorder = store.begin_run("upload").unwrap();
        recorder
            .record(PipelineStage::Finalize, &json!([]))
            .unwrap();
        let run_id = recorder.run_id().to_string();

        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].label, "upload");
        assert_eq!(runs[0].stages, vec![PipelineStage::Finalize]);

        store.delete_run(&run_id).unwrap();
        assert!(store.list_runs().unwrap().is_empty());
        assert!(matches!(
            store.delete_run(&run_id),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_stage_not_found() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::with_dir(dir.path());
        let recorder = store.begin_run("x").unwrap();

        assert!(matches!(
            store.load(recorder.run_id(), PipelineStage::Dedup),
            Err(SnapshotError::NotFound(_))
        ));
        assert!(matches!(
            store.load("../escape", PipelineStage::Dedup),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(file_name(PipelineStage::Dedup), "01-dedup.json");
        assert_eq!(file_name(PipelineStage::ResolveNulls), "03-resolve_nulls.json");
    }
}

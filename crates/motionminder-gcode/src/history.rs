//! History replay over archived G-code files
//!
//! A job measures every file in order and returns a summary. It never
//! touches the odometer; merging the result is left to the caller so a
//! failed or cancelled batch leaves live state alone.

use crate::measure::{measure_file, FileDistance};
use chrono::{DateTime, Utc};
use motionminder_core::{AxisMap, GcodeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// One archived file to replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    /// Extrusion at which an interrupted job stopped
    pub max_extrusion_mm: Option<f64>,
}

impl HistoryEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_extrusion_mm: None,
        }
    }

    pub fn interrupted_at(mut self, extrusion_mm: f64) -> Self {
        self.max_extrusion_mm = Some(extrusion_mm);
        self
    }
}

/// One job from a Moonraker `/server/history/list` dump
#[derive(Debug, Deserialize)]
struct RecordedJob {
    filename: String,
    #[serde(default)]
    status: String,
    filament_used: Option<f64>,
    #[serde(default = "file_exists")]
    exists: bool,
}

fn file_exists() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct JobPage {
    jobs: Vec<RecordedJob>,
}

/// Accepted shapes: the full API response, its `result` object, or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobList {
    Response { result: JobPage },
    Page(JobPage),
    Jobs(Vec<RecordedJob>),
}

impl JobList {
    fn into_jobs(self) -> Vec<RecordedJob> {
        match self {
            JobList::Response { result } => result.jobs,
            JobList::Page(page) => page.jobs,
            JobList::Jobs(jobs) => jobs,
        }
    }
}

/// Cooperative cancellation flag shared with a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop before its next file
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A file that could not be measured
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: GcodeError,
}

/// Result of a completed history job
#[derive(Debug, Clone)]
pub struct HistorySummary {
    pub job_id: Uuid,
    pub succeeded: Vec<FileDistance>,
    pub failed: Vec<FileFailure>,
    /// Sum of the travel of every successful file
    pub total: AxisMap<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HistorySummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Operator-facing one-line summary
    pub fn describe(&self) -> String {
        format!(
            "History processed: {} file(s) succeeded, {} failed, total X={:.3} mm Y={:.3} mm Z={:.3} mm",
            self.success_count(),
            self.failure_count(),
            self.total.x,
            self.total.y,
            self.total.z
        )
    }
}

/// Batch of archived files to replay
#[derive(Debug, Clone)]
pub struct HistoryJob {
    id: Uuid,
    entries: Vec<HistoryEntry>,
}

impl HistoryJob {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entries,
        }
    }

    /// Build a job from the G-code files directly inside `dir`
    ///
    /// Files are matched case-insensitively against `extensions` and
    /// ordered by file name.
    pub fn from_directory(
        dir: impl AsRef<Path>,
        extensions: &[String],
    ) -> Result<Self, GcodeError> {
        let dir = dir.as_ref();
        let read_dir = fs::read_dir(dir).map_err(|e| GcodeError::FileError {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            })
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Self::new(paths.into_iter().map(HistoryEntry::new).collect()))
    }

    /// Build a job from a recorded print history
    ///
    /// Jobs whose file no longer exists are skipped. Any status other than
    /// `complete` replays the file only up to the filament the job used.
    pub fn from_job_list(
        list_path: impl AsRef<Path>,
        gcode_dir: impl AsRef<Path>,
    ) -> Result<Self, GcodeError> {
        let list_path = list_path.as_ref();
        let list_error = |reason: String| GcodeError::FileError {
            path: list_path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(list_path).map_err(|e| list_error(e.to_string()))?;
        let list: JobList =
            serde_json::from_str(&content).map_err(|e| list_error(e.to_string()))?;

        let gcode_dir = gcode_dir.as_ref();
        let entries: Vec<HistoryEntry> = list
            .into_jobs()
            .into_iter()
            .filter(|job| job.exists)
            .map(|job| {
                let entry = HistoryEntry::new(gcode_dir.join(&job.filename));
                if job.status == "complete" {
                    entry
                } else {
                    entry.interrupted_at(job.filament_used.unwrap_or(0.0))
                }
            })
            .collect();
        tracing::debug!(
            "Loaded {} recorded job(s) from {}",
            entries.len(),
            list_path.display()
        );

        Ok(Self::new(entries))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Measure every file, yielding to the runtime between files
    ///
    /// Per-file failures are collected into the summary. Cancellation is
    /// checked before each file and returns [`GcodeError::Cancelled`].
    pub async fn run(&self, cancel: &CancelToken) -> Result<HistorySummary, GcodeError> {
        let started_at = Utc::now();
        let total_files = self.entries.len();
        tracing::info!("History job {} started with {} file(s)", self.id, total_files);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "History job {} cancelled after {}/{} file(s)",
                    self.id,
                    index,
                    total_files
                );
                return Err(GcodeError::Cancelled {
                    completed: index,
                    total: total_files,
                });
            }

            let path = entry.path.clone();
            let max_extrusion = entry.max_extrusion_mm;
            let result = tokio::task::spawn_blocking(move || measure_file(&path, max_extrusion))
                .await
                .unwrap_or_else(|e| {
                    Err(GcodeError::FileError {
                        path: entry.path.display().to_string(),
                        reason: format!("measurement task failed: {}", e),
                    })
                });

            match result {
                Ok(distance) => succeeded.push(distance),
                Err(error) => {
                    tracing::warn!("Skipping {}: {}", entry.path.display(), error);
                    failed.push(FileFailure {
                        path: entry.path.clone(),
                        error,
                    });
                }
            }

            tokio::task::yield_now().await;
        }

        let total = succeeded
            .iter()
            .fold(AxisMap::splat(0.0), |acc, d| acc.add(&d.travel));

        let summary = HistorySummary {
            job_id: self.id,
            succeeded,
            failed,
            total,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!("History job {} finished: {}", self.id, summary.describe());
        Ok(summary)
    }
}

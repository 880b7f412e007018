//! Append-only log of comparison summaries.
//!
//! One JSON line per run, summaries only. Per-resource detail stays in
//! the report itself so the history file stays small enough to diff and
//! plot over months of scans.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::compare::FidelityReport;
use crate::error::FidelityError;
use crate::metrics::FidelityMetrics;

/// One line of the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// When the comparison ran.
    pub generated_at: DateTime<Utc>,
    /// Layer the comparison read as source.
    pub source_layer: String,
    /// Layer the comparison read as target.
    pub target_layer: String,
    /// Whether identity fell back to heuristics for any resource.
    pub degraded: bool,
    /// Summary counters from the run.
    pub metrics: FidelityMetrics,
}

impl From<&FidelityReport> for HistoryEntry {
    fn from(report: &FidelityReport) -> Self {
        Self {
            generated_at: report.generated_at,
            source_layer: report.source.layer.to_string(),
            target_layer: report.target.layer.to_string(),
            degraded: report.degraded,
            metrics: report.summary.clone(),
        }
    }
}

/// JSON-lines history of fidelity runs.
#[derive(Debug, Clone)]
pub struct FidelityHistory {
    path: PathBuf,
}

impl FidelityHistory {
    /// Point the history at a JSON-lines file, created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report's summary.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Io`] when the file cannot be written.
    pub async fn append(&self, report: &FidelityReport) -> Result<(), FidelityError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let mut line = serde_json::to_vec(&HistoryEntry::from(report))?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), "fidelity history appended");
        Ok(())
    }

    /// All recorded entries, oldest first. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Io`] on read failures other than a missing
    /// file, and [`FidelityError::Malformed`] when a line is not valid
    /// JSON.
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, FidelityError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for line in raw.split(|byte| *byte == b'\n') {
            if line.is_empty() {
                continue;
            }
            entries.push(serde_json::from_slice(line)?);
        }
        Ok(entries)
    }
}

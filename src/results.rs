//! CSV result file: one header, then one flushed row per attempted combination.

use crate::extract::MetricRecord;
use crate::plan::RunCombination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Column order of the result file.
pub const HEADER: [&str; 14] = [
    "timestamp",
    "model",
    "power_mode",
    "swap_enabled",
    "status",
    "error_message",
    "total_duration_s",
    "load_duration_s",
    "prompt_eval_count",
    "prompt_eval_duration_s",
    "prompt_eval_rate_tps",
    "eval_count",
    "eval_duration_s",
    "eval_rate_tps",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// One CSV record. Field order must match `HEADER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub power_mode: String,
    pub swap_enabled: String,
    pub status: RunStatus,
    pub error_message: String,
    pub total_duration_s: Option<f64>,
    pub load_duration_s: Option<f64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration_s: Option<f64>,
    pub prompt_eval_rate_tps: Option<f64>,
    pub eval_count: Option<u64>,
    pub eval_duration_s: Option<f64>,
    pub eval_rate_tps: Option<f64>,
}

impl ResultRow {
    fn new(
        combination: &RunCombination,
        status: RunStatus,
        error_message: String,
        metrics: MetricRecord,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            model: combination.model.clone(),
            power_mode: combination.power_mode.clone(),
            swap_enabled: combination.swap.clone(),
            status,
            error_message,
            total_duration_s: metrics.total_duration_s,
            load_duration_s: metrics.load_duration_s,
            prompt_eval_count: metrics.prompt_eval_count,
            prompt_eval_duration_s: metrics.prompt_eval_duration_s,
            prompt_eval_rate_tps: metrics.prompt_eval_rate_tps,
            eval_count: metrics.eval_count,
            eval_duration_s: metrics.eval_duration_s,
            eval_rate_tps: metrics.eval_rate_tps,
        }
    }

    pub fn success(combination: &RunCombination, metrics: MetricRecord) -> Self {
        Self::new(combination, RunStatus::Success, String::new(), metrics)
    }

    pub fn failure(combination: &RunCombination, error_message: impl Into<String>) -> Self {
        Self::new(
            combination,
            RunStatus::Failure,
            error_message.into(),
            MetricRecord::default(),
        )
    }

    /// The metric columns of this row.
    pub fn metrics(&self) -> MetricRecord {
        MetricRecord {
            total_duration_s: self.total_duration_s,
            load_duration_s: self.load_duration_s,
            prompt_eval_count: self.prompt_eval_count,
            prompt_eval_duration_s: self.prompt_eval_duration_s,
            prompt_eval_rate_tps: self.prompt_eval_rate_tps,
            eval_count: self.eval_count,
            eval_duration_s: self.eval_duration_s,
            eval_rate_tps: self.eval_rate_tps,
        }
    }
}

/// Errors that can occur while writing the result file.
#[derive(Debug)]
pub enum ResultsError {
    /// Failed to create the file or its parent directory.
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to encode or write a record.
    Write { path: PathBuf, source: csv::Error },
    /// Failed to flush a record to disk.
    Sync {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsError::Create { path, source } => {
                write!(f, "failed to create {}: {}", path.display(), source)
            }
            ResultsError::Write { path, source } => {
                write!(f, "failed to write row to {}: {}", path.display(), source)
            }
            ResultsError::Sync { path, source } => {
                write!(f, "failed to flush {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ResultsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResultsError::Create { source, .. } => Some(source),
            ResultsError::Write { source, .. } => Some(source),
            ResultsError::Sync { source, .. } => Some(source),
        }
    }
}

/// Append-only writer over a freshly truncated result file.
///
/// Every row is flushed and synced before `append` returns, so a crash loses
/// at most the row in flight. The underlying `csv::Writer` flushes on drop.
pub struct ResultWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl ResultWriter {
    /// Create (or truncate) the file at `path` and write the header.
    pub fn create(path: &Path) -> Result<Self, ResultsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResultsError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = File::create(path).map_err(|e| ResultsError::Create {
            path: path.to_path_buf(),
            source: e,
        })?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut results = Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        };
        results
            .writer
            .write_record(HEADER)
            .map_err(|e| ResultsError::Write {
                path: results.path.clone(),
                source: e,
            })?;
        results.sync()?;

        tracing::info!(path = %path.display(), "result file created");
        Ok(results)
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &ResultRow) -> Result<(), ResultsError> {
        self.writer
            .serialize(row)
            .map_err(|e| ResultsError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        self.sync()?;
        self.rows += 1;
        tracing::debug!(
            rows = self.rows,
            status = ?row.status,
            model = %row.model,
            "result row written"
        );
        Ok(())
    }

    fn sync(&mut self) -> Result<(), ResultsError> {
        self.writer.flush().map_err(|e| ResultsError::Sync {
            path: self.path.clone(),
            source: e,
        })?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| ResultsError::Sync {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Number of rows appended so far (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every row of a result file back.
#[cfg(test)]
pub fn read_rows(path: &Path) -> Vec<ResultRow> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .deserialize::<ResultRow>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

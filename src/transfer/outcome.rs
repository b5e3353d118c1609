//! Per-file outcomes, folder reports and the console summary.

use std::time::Instant;

use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};

use crate::error::Error;

/// Result of one Transfer Unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Success,
    Skipped,
    Failed,
}

/// Record of one file transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub path: String,
    pub size: u64,
    pub status: TransferStatus,
    pub error: Option<String>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl TransferOutcome {
    pub fn success(path: impl Into<String>, size: u64, started: DateTime<Utc>) -> Self {
        Self::finish(path, size, TransferStatus::Success, None, started)
    }

    pub fn skipped(path: impl Into<String>, size: u64, started: DateTime<Utc>) -> Self {
        Self::finish(path, size, TransferStatus::Skipped, None, started)
    }

    pub fn failed(path: impl Into<String>, size: u64, error: impl ToString, started: DateTime<Utc>) -> Self {
        Self::finish(path, size, TransferStatus::Failed, Some(error.to_string()), started)
    }

    fn finish(
        path: impl Into<String>,
        size: u64,
        status: TransferStatus,
        error: Option<String>,
        started: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            status,
            error,
            started,
            finished: Utc::now(),
        }
    }

    /// Wall-clock seconds spent on this file.
    pub fn elapsed_secs(&self) -> f64 {
        let millis = (self.finished - self.started).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Console line for this outcome.
    pub fn line(&self) -> String {
        match self.status {
            TransferStatus::Success => {
                let secs = self.elapsed_secs();
                let speed = if secs > 0.0 { (self.size as f64 / secs) as u64 } else { self.size };
                format!(
                    "✓ {} ({}, {}/s)",
                    self.path,
                    format_size(self.size, BINARY),
                    format_size(speed, BINARY)
                )
            }
            TransferStatus::Skipped => format!("- {} (skipped)", self.path),
            TransferStatus::Failed => format!(
                "✗ {} (failed: {})",
                self.path,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Exit status of one folder operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Success,
    Error,
    NoAssetsFound,
}

impl FolderStatus {
    /// Process exit code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::NoAssetsFound => 66,
        }
    }

    /// Status for an operation that failed with `err`.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::NoAssets { .. } => Self::NoAssetsFound,
            _ => Self::Error,
        }
    }
}

/// Aggregate result of one folder operation.
#[derive(Debug, Clone)]
pub struct FolderReport {
    pub status: FolderStatus,
    pub outcomes: Vec<TransferOutcome>,
    /// Extra local files removed by `--delete`.
    pub deleted: usize,
}

impl FolderReport {
    /// Status is `Error` if any outcome failed.
    pub fn from_outcomes(outcomes: Vec<TransferOutcome>) -> Self {
        let status = if outcomes.iter().any(|o| o.status == TransferStatus::Failed) {
            FolderStatus::Error
        } else {
            FolderStatus::Success
        };
        Self {
            status,
            outcomes,
            deleted: 0,
        }
    }

    pub fn no_assets() -> Self {
        Self {
            status: FolderStatus::NoAssetsFound,
            outcomes: Vec::new(),
            deleted: 0,
        }
    }

    pub fn count(&self, status: TransferStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.status == FolderStatus::Success
    }
}

/// Direction of a folder operation, used for wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Upload => "uploaded",
            Self::Download => "downloaded",
        }
    }

    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::Upload => "Uploading files",
            Self::Download => "Downloading files",
        }
    }
}

/// Reports outcomes from concurrent units as they finish and prints the
/// console summary.
pub struct TransferTracker {
    direction: Direction,
    quiet: bool,
    per_file_lines: bool,
    started: Instant,
}

impl TransferTracker {
    /// `per_file_lines` should be false while a progress bar owns the terminal.
    pub fn new(direction: Direction, quiet: bool, per_file_lines: bool) -> Self {
        Self {
            direction,
            quiet,
            per_file_lines: per_file_lines && !quiet,
            started: Instant::now(),
        }
    }

    pub fn record(&self, outcome: &TransferOutcome) {
        tracing::debug!(
            path = %outcome.path,
            status = ?outcome.status,
            error = outcome.error.as_deref().unwrap_or(""),
            "transfer finished"
        );
        if outcome.status == TransferStatus::Failed {
            tracing::error!(
                path = %outcome.path,
                error = outcome.error.as_deref().unwrap_or(""),
                "transfer failed"
            );
        }
        if self.per_file_lines {
            println!("{}", outcome.line());
        }
    }

    /// Summary line for `outcomes`.
    pub fn summary(&self, outcomes: &[TransferOutcome]) -> String {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        let bytes: u64 = outcomes
            .iter()
            .filter(|o| o.status == TransferStatus::Success)
            .map(|o| o.size)
            .sum();
        format!(
            "Files {}: {}, skipped: {}, failed: {}, size: {}, time: {:.2}s",
            self.direction.verb(),
            count(TransferStatus::Success),
            count(TransferStatus::Skipped),
            count(TransferStatus::Failed),
            format_size(bytes, BINARY),
            self.started.elapsed().as_secs_f64()
        )
    }

    pub fn print_summary(&self, outcomes: &[TransferOutcome]) {
        let line = self.summary(outcomes);
        tracing::debug!("{}", line);
        if !self.quiet {
            println!("{}", line);
        }
    }
}

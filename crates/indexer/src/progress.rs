use serde::Serialize;
use std::fmt;

/// A soft per-batch failure recorded during a scan.
///
/// Recorded in delivery order; the scan keeps going past these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    pub message: String,
    pub cause: Option<String>,
}

impl BatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {cause}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Typed progress emitted by the scanner over an ordered channel.
///
/// One aggregation loop consumes the stream, so counters stay monotonically
/// non-decreasing and updates are republished in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A parsed file yielded this many candidate blocks.
    BlocksFound(u64),
    /// A batch of blocks was embedded and upserted.
    BlocksIndexed(u64),
    /// A batch failed; the scan continues.
    BatchError(BatchError),
}

/// File disposition inside a watcher batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Success,
    /// The backend rejected the file (embed or upsert failed).
    Error,
    /// The file could not be read or chunked on this machine.
    LocalError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: String,
    pub status: FileStatus,
}

/// Watcher stream: a debounced batch began processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStarted {
    pub total: u64,
}

/// Watcher stream: progress inside the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: u64,
    pub total: u64,
    pub current_file: Option<String>,
}

/// Watcher stream: a batch finished; diagnostic only, never retained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub processed_files: Vec<FileOutcome>,
    pub batch_error: Option<String>,
}

impl BatchSummary {
    /// (success, error, local_error) tallies for logging.
    #[must_use]
    pub fn tally(&self) -> (usize, usize, usize) {
        let mut tally = (0, 0, 0);
        for outcome in &self.processed_files {
            match outcome.status {
                FileStatus::Success => tally.0 += 1,
                FileStatus::Error => tally.1 += 1,
                FileStatus::LocalError => tally.2 += 1,
            }
        }
        tally
    }
}

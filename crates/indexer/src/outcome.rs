use crate::progress::{BatchError, ScanEvent};

/// Fraction of found blocks allowed to fail before a run with batch errors
/// stops counting as a success.
pub const MAX_PARTIAL_FAILURE_RATE: f64 = 0.10;

/// Run-scoped accumulator for one scan.
///
/// Built fresh for every `start_indexing` invocation, so nothing leaks into
/// the next run. Counters only ever grow while events are applied.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    blocks_found: u64,
    blocks_indexed: u64,
    batch_errors: Vec<BatchError>,
}

/// Exhaustive disposition of a finished scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Success,
    /// Blocks were found but none made it into the index.
    TotalFailure { first_error: Option<BatchError> },
    /// Too many blocks were dropped on the floor along the way.
    PartialFailure {
        blocks_indexed: u64,
        blocks_found: u64,
        first_error: BatchError,
    },
}

impl ScanOutcome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::BlocksFound(n) => self.blocks_found += n,
            ScanEvent::BlocksIndexed(n) => self.blocks_indexed += n,
            ScanEvent::BatchError(error) => self.batch_errors.push(error),
        }
    }

    #[must_use]
    pub const fn blocks_found(&self) -> u64 {
        self.blocks_found
    }

    #[must_use]
    pub const fn blocks_indexed(&self) -> u64 {
        self.blocks_indexed
    }

    #[must_use]
    pub fn batch_errors(&self) -> &[BatchError] {
        &self.batch_errors
    }

    /// Classify the finished run.
    ///
    /// The failure rate is `(found - indexed) / found` and is not evaluated
    /// when nothing was found: an empty workspace is a successful run, not a
    /// failed one. Ties between recorded errors break toward the earliest
    /// one, so the surfaced message is deterministic.
    #[must_use]
    pub fn classify(&self) -> ScanVerdict {
        if self.blocks_found == 0 {
            return ScanVerdict::Success;
        }

        if self.blocks_indexed == 0 {
            return ScanVerdict::TotalFailure {
                first_error: self.batch_errors.first().cloned(),
            };
        }

        let failed = self.blocks_found.saturating_sub(self.blocks_indexed);
        let failure_rate = failed as f64 / self.blocks_found as f64;
        if failure_rate > MAX_PARTIAL_FAILURE_RATE {
            if let Some(first_error) = self.batch_errors.first() {
                return ScanVerdict::PartialFailure {
                    blocks_indexed: self.blocks_indexed,
                    blocks_found: self.blocks_found,
                    first_error: first_error.clone(),
                };
            }
        }

        ScanVerdict::Success
    }
}

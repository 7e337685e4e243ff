use serde::Serialize;

/// Aggregate numbers for one full scan run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanStats {
    pub files_walked: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub blocks_found: u64,
    pub blocks_indexed: u64,
    pub time_ms: u64,
}

impl ScanStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed_file(&mut self, blocks: u64) {
        self.files_indexed += 1;
        self.blocks_indexed += blocks;
    }

    pub fn add_skipped_file(&mut self) {
        self.files_skipped += 1;
    }

    pub fn add_failed_file(&mut self) {
        self.files_failed += 1;
    }
}

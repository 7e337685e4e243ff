/// One candidate block cut from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChunk {
    pub text: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
}

/// Seam for block extraction.
///
/// What counts as a block is a policy decision owned by the host; the
/// orchestration layer only moves blocks around.
pub trait BlockChunker: Send + Sync {
    fn chunk(&self, content: &str) -> Vec<BlockChunk>;
}

/// Fixed-window fallback chunker: consecutive windows of at most `max_lines`
/// lines, all-blank windows dropped.
pub struct LineBlockChunker {
    max_lines: usize,
}

impl LineBlockChunker {
    pub const DEFAULT_MAX_LINES: usize = 64;

    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }
}

impl Default for LineBlockChunker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LINES)
    }
}

impl BlockChunker for LineBlockChunker {
    fn chunk(&self, content: &str) -> Vec<BlockChunk> {
        let lines: Vec<&str> = content.lines().collect();
        let mut blocks = Vec::new();

        for (window_index, window) in lines.chunks(self.max_lines).enumerate() {
            if window.iter().all(|line| line.trim().is_empty()) {
                continue;
            }
            let start_line = window_index * self.max_lines + 1;
            blocks.push(BlockChunk {
                text: window.join("\n"),
                start_line,
                end_line: start_line + window.len() - 1,
            });
        }

        blocks
    }
}

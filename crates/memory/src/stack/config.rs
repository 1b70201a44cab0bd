//! Stack heap configuration

/// Configuration for a stack heap
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Size of each block in the chain; requests larger than this get a
    /// dedicated block
    pub block_size: usize,

    /// Fill pattern written over fresh allocations when debugging
    pub alloc_pattern: Option<u8>,

    /// Enable allocation counting
    pub track_stats: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            track_stats: cfg!(debug_assertions),
        }
    }
}

impl StackConfig {
    /// Production configuration - optimized for performance
    pub fn production() -> Self {
        Self {
            block_size: 64 * 1024,
            alloc_pattern: None,
            track_stats: false,
        }
    }

    /// Debug configuration - optimized for catching stale reads
    pub fn debug() -> Self {
        Self {
            block_size: 64 * 1024,
            alloc_pattern: Some(0xCC),
            track_stats: true,
        }
    }

    /// Override the block size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        assert!(block_size > 0, "block size cannot be zero");
        self.block_size = block_size;
        self
    }
}

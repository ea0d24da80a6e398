use crate::error::{Error, Result};

/// Size of the first slab of a buffer.
pub const MIN_SLAB_SIZE: usize = 1 << 10;
/// Upper bound for slabs allocated by growth.
pub const MAX_SLAB_SIZE: usize = 64 << 20;

/// The widest fixed-width write, every slab must be able to hold one.
const WIDEST_WRITE: usize = 8;

/// Slab sizing and allocation source of a `DurableBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    pub min_slab_size: usize,
    pub max_slab_size: usize,
    /// Draw slabs from the pool; meant for short-lived buffers.
    pub use_cache: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_slab_size: MIN_SLAB_SIZE,
            max_slab_size: MAX_SLAB_SIZE,
            use_cache: true,
        }
    }
}

impl BufferConfig {
    pub fn with_min_slab_size(mut self, size: usize) -> Self {
        self.min_slab_size = size;
        self
    }

    pub fn with_max_slab_size(mut self, size: usize) -> Self {
        self.max_slab_size = size;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_slab_size < WIDEST_WRITE {
            return Err(Error::InvalidConfig(format!(
                "min_slab_size must be at least {WIDEST_WRITE}, got {}",
                self.min_slab_size
            )));
        }
        if self.max_slab_size < self.min_slab_size {
            return Err(Error::InvalidConfig(format!(
                "max_slab_size {} is smaller than min_slab_size {}",
                self.max_slab_size, self.min_slab_size
            )));
        }
        Ok(())
    }
}

/// Limits of the slab pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Larger slabs are never pooled.
    pub max_cached_slab_size: usize,
    /// Free slabs kept per size class.
    pub max_cached_per_class: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_cached_slab_size: 1 << 20,
            max_cached_per_class: 32,
        }
    }
}

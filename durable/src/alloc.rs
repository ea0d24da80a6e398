use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::trace;

use crate::config::AllocatorConfig;

/// Counters describing what the allocator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Slabs handed out, pooled or not
    pub allocated: u64,
    /// Allocations served from a free list
    pub pool_hits: u64,
    /// Slabs returned, explicitly or on drop
    pub released: u64,
    /// Free slabs currently held by the pool
    pub cached: usize,
}

impl AllocatorStats {
    /// Slabs handed out and not yet returned
    pub fn outstanding(&self) -> u64 {
        self.allocated - self.released
    }
}

struct PoolState {
    /// Free slabs indexed by `log2(capacity)`.
    free_lists: Vec<Vec<Box<[u8]>>>,
    stats: AllocatorStats,
}

struct Pool {
    config: AllocatorConfig,
    state: Mutex<PoolState>,
}

impl Pool {
    fn recycle(&self, bytes: Box<[u8]>, pooled: bool) {
        let mut state = self.state.lock();
        state.stats.released += 1;
        if !pooled {
            return;
        }
        let class = bytes.len().trailing_zeros() as usize;
        if state.free_lists[class].len() < self.config.max_cached_per_class {
            state.free_lists[class].push(bytes);
            state.stats.cached += 1;
        }
    }
}

/// Hands out [`Slab`]s, optionally from a pool of power-of-two size classes.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct SlabAllocator {
    pool: Arc<Pool>,
}

impl Default for SlabAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl SlabAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        let classes = usize::BITS as usize;
        let state = PoolState {
            free_lists: (0..classes).map(|_| Vec::new()).collect(),
            stats: AllocatorStats::default(),
        };
        Self {
            pool: Arc::new(Pool {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// The process-wide allocator used by buffers that are not given one.
    pub fn global() -> SlabAllocator {
        static GLOBAL: OnceLock<SlabAllocator> = OnceLock::new();
        GLOBAL.get_or_init(SlabAllocator::default).clone()
    }

    pub fn config(&self) -> AllocatorConfig {
        self.pool.config
    }

    /// Allocates a slab of at least `min_size` bytes.
    ///
    /// With `use_cache`, sizes up to `max_cached_slab_size` are rounded up to
    /// a power of two and served from (and later returned to) the pool.
    /// Everything else gets an exact, unpooled allocation.
    ///
    /// The contents of the slab are unspecified until written: a slab served
    /// from the pool still holds whatever its previous owner wrote.
    pub fn allocate(&self, min_size: usize, use_cache: bool) -> Slab {
        let min_size = min_size.max(1);
        let class_size = min_size.next_power_of_two();
        let pooled = use_cache && class_size <= self.pool.config.max_cached_slab_size;

        let recycled = {
            let mut state = self.pool.state.lock();
            state.stats.allocated += 1;
            let reused = if pooled {
                state.free_lists[class_size.trailing_zeros() as usize].pop()
            } else {
                None
            };
            if reused.is_some() {
                state.stats.pool_hits += 1;
                state.stats.cached -= 1;
            }
            reused
        };

        let bytes = match recycled {
            Some(bytes) => {
                trace!(size = class_size, "slab served from pool");
                bytes
            }
            None => {
                let size = if pooled { class_size } else { min_size };
                trace!(size, pooled, "allocating slab");
                vec![0u8; size].into_boxed_slice()
            }
        };

        Slab {
            len: bytes.len(),
            bytes,
            pooled,
            pool: Arc::clone(&self.pool),
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        self.pool.state.lock().stats
    }
}

impl fmt::Debug for SlabAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabAllocator")
            .field("config", &self.pool.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A fixed-capacity region of memory owned by exactly one holder.
///
/// A slab goes back to its allocator exactly once: through
/// [`Slab::release`] or when it is dropped. Handing it to a read view moves
/// it, so it cannot be released and read at the same time.
pub struct Slab {
    bytes: Box<[u8]>,
    /// Visible length, `bytes.len()` until trimmed
    len: usize,
    pooled: bool,
    pool: Arc<Pool>,
}

impl Slab {
    /// Bytes available for writing
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Bytes up to `len()`. Only the ones the holder wrote are meaningful,
    /// see [`SlabAllocator::allocate`].
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    /// Narrows the visible bytes to the first `len`, without copying.
    pub fn trim(mut self, len: usize) -> Slab {
        self.len = len.min(self.len);
        self
    }

    /// Returns the slab to its allocator.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Slab {
    fn drop(&mut self) {
        let bytes = std::mem::take(&mut self.bytes);
        self.pool.recycle(bytes, self.pooled);
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("pooled", &self.pooled)
            .finish()
    }
}

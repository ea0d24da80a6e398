pub mod alloc;
pub mod buffer;
mod config;
mod error;
pub mod input;
pub mod prefix;
pub use alloc::{AllocatorStats, Slab, SlabAllocator};
pub use buffer::DurableBuffer;
pub use config::{AllocatorConfig, BufferConfig, MAX_SLAB_SIZE, MIN_SLAB_SIZE};
pub use error::{Error, Result};
pub use input::SlabInput;
pub use prefix::{BlockKind, BlockPrefix};

use modular_bitfield::prelude::*;

/// Hash value reserved for empty slots.
pub const NONE: u32 = 0;
/// Stored in place of a key hash that mixes down to `NONE`.
pub const FALLBACK: u32 = 1;

pub const ENTRY_INDEX_MASK: u32 = (1 << 31) - 1;

/// A single slot of the probe table, packed into 64 bits.
///
/// Layout, least significant bit first:
/// `[hash: 32][entry_index: 31][tombstone: 1]`
///
/// A row whose hash is `NONE` is an empty slot. Tombstoned rows keep their
/// hash so probe distances past a deleted slot stay meaningful.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    pub hash: B32,
    pub entry_index: B31,
    pub tombstone: bool,
}

impl From<Row> for u64 {
    fn from(row: Row) -> u64 {
        u64::from_le_bytes(row.into_bytes())
    }
}

impl From<u64> for Row {
    fn from(value: u64) -> Self {
        Row::from_bytes(value.to_le_bytes())
    }
}

/// Packs a hash and an entry index into a live row.
#[inline]
pub fn construct(hash: u32, entry_index: usize) -> Row {
    Row::new()
        .with_hash(hash)
        .with_entry_index(entry_index as u32 & ENTRY_INDEX_MASK)
}

impl Row {
    /// Never written, never deleted.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.hash() == NONE && !self.tombstone()
    }

    /// Holds a live entry.
    #[inline]
    pub fn populated(self) -> bool {
        self.hash() != NONE && !self.tombstone()
    }

    #[inline]
    pub fn index(self) -> usize {
        self.entry_index() as usize
    }

    #[inline]
    pub fn add_tombstone(self) -> Row {
        self.with_tombstone(true)
    }

    #[inline]
    pub fn remove_tombstone(self) -> Row {
        self.with_tombstone(false)
    }
}

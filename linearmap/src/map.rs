use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

use tracing::debug;

use crate::error::{Error, Result};
use crate::row::{self, Row, FALLBACK, NONE};
use crate::strategy::Strategy;

/// Largest number of entries a map can hold.
pub const MAX_CAPACITY: usize = (1 << 30) - 1;
/// Ratio of live entries to probe table slots the table is sized for.
pub const LOAD_FACTOR: f64 = 0.95;

const DEFAULT_CAPACITY: usize = 8;
const MIN_CAPACITY: usize = 4;

/// Number of probe table slots needed to hold `capacity` entries.
fn table_length(capacity: usize) -> usize {
    ((capacity as f64 / LOAD_FACTOR).ceil() as usize).next_power_of_two()
}

/// Folds the high bits down so keys that only differ in their high bits
/// still land in different slots, and keeps `NONE` free for empty rows.
#[inline]
pub fn mix(hash: u32) -> u32 {
    let mut h = hash;
    h ^= (h >> 20) ^ (h >> 12);
    h ^= (h >> 7) ^ (h >> 4);
    if h == NONE {
        FALLBACK
    } else {
        h
    }
}

/// A single-owner hash map using Robin Hood placement.
///
/// Entries live densely packed in insertion/compaction order, so
/// [`LinearMap::entries`] is an O(1) slice. The probe table only stores
/// packed [`Row`]s pointing into that slice. Deleted slots are tombstoned,
/// and tombstones are dropped whenever the table is rebuilt. Live entries and
/// tombstones together never reach `capacity`, so the probe table always
/// keeps an empty slot to end every walk.
///
/// Hashing and equality come from a [`Strategy`] captured at construction,
/// shared with every map derived from this one.
///
/// There is no persistent/forked form of this map, see [`LinearMap::forked`].
#[derive(Clone)]
pub struct LinearMap<K, V> {
    strategy: Strategy<K>,
    index_mask: usize,
    table: Box<[Row]>,
    entries: Vec<(K, V)>,
    capacity: usize,
    tombstones: usize,
}

impl<K: Hash + Eq + 'static, V> Default for LinearMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + 'static, V> LinearMap<K, V> {
    /// Creates an empty map with room for 8 entries
    pub fn new() -> Self {
        Self::alloc(DEFAULT_CAPACITY, Strategy::default())
    }

    /// Creates an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_strategy(capacity, Strategy::default())
    }
}

impl<K, V> LinearMap<K, V> {
    /// Creates an empty map using the given hash function and equality predicate
    pub fn with_hasher<H, E>(capacity: usize, hash_fn: H, eq_fn: E) -> Result<Self>
    where
        H: Fn(&K) -> u32 + Send + Sync + 'static,
        E: Fn(&K, &K) -> bool + Send + Sync + 'static,
    {
        Self::with_strategy(capacity, Strategy::new(hash_fn, eq_fn))
    }

    pub fn with_strategy(capacity: usize, strategy: Strategy<K>) -> Result<Self> {
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self::alloc(capacity, strategy))
    }

    fn alloc(capacity: usize, strategy: Strategy<K>) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let table_len = table_length(capacity);
        Self {
            strategy,
            index_mask: table_len - 1,
            table: vec![Row::new(); table_len].into_boxed_slice(),
            entries: Vec::with_capacity(capacity),
            capacity,
            tombstones: 0,
        }
    }

    /// Returns the number of key-value pairs in the map
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map contains no elements
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries the map holds before it has to be rebuilt
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots in the probe table
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    pub fn strategy(&self) -> &Strategy<K> {
        &self.strategy
    }

    /// The dense entry array, in whatever order insertions and removals left it.
    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Entry at position `index` of [`LinearMap::entries`]
    pub fn nth(&self, index: usize) -> Option<&(K, V)> {
        self.entries.get(index)
    }

    fn key_hash(&self, key: &K) -> u32 {
        mix(self.strategy.hash(key))
    }

    #[inline]
    fn ideal_index(&self, hash: u32) -> usize {
        hash as usize & self.index_mask
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        (idx + 1) & self.index_mask
    }

    #[inline]
    fn probe_distance(&self, hash: u32, idx: usize) -> usize {
        (idx + self.table.len() - self.ideal_index(hash)) & self.index_mask
    }

    /// Probe table slot holding `key`, if any.
    fn find_slot(&self, hash: u32, key: &K) -> Option<usize> {
        let mut idx = self.ideal_index(hash);
        let mut dist = 0;
        loop {
            let row = self.table[idx];
            let curr = row.hash();
            if curr == hash
                && !row.tombstone()
                && self.strategy.equals(key, &self.entries[row.index()].0)
            {
                return Some(idx);
            }
            if curr == NONE || dist > self.probe_distance(curr, idx) {
                // under Robin Hood ordering nothing further along can hold the key
                return None;
            }
            idx = self.next_index(idx);
            dist += 1;
        }
    }

    /// Position of `key` within [`LinearMap::entries`]
    pub fn index_of(&self, key: &K) -> Option<usize> {
        let hash = self.key_hash(key);
        self.find_slot(hash, key).map(|idx| self.table[idx].index())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index_of(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let i = self.index_of(key)?;
        Some(&mut self.entries[i].1)
    }

    /// Value under `key`, or `default` when the key is absent
    pub fn get_or<'a>(&'a self, key: &K, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index_of(key).is_some()
    }

    /// Returns the value under `key`, inserting `f()` first if there is none
    pub fn get_or_create(&mut self, key: K, f: impl FnOnce() -> V) -> Result<&mut V> {
        let i = match self.index_of(&key) {
            Some(i) => i,
            None => {
                self.put(key, f())?;
                self.entries.len() - 1
            }
        };
        Ok(&mut self.entries[i].1)
    }

    /// Inserts or overwrites `key`, returning the value it replaced.
    ///
    /// Rebuilds the map at twice its capacity when the entry array is full,
    /// or at the same capacity when tombstones fill the rest of it.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        if self.entries.len() + self.tombstones >= self.capacity {
            let capacity = if self.entries.len() == self.capacity {
                self.capacity << 1
            } else {
                self.capacity
            };
            self.rebuild(capacity)?;
        }
        let hash = self.key_hash(&key);
        Ok(self.put_hashed(hash, key, value))
    }

    fn put_hashed(&mut self, hash: u32, key: K, value: V) -> Option<V> {
        debug_assert!(self.entries.len() + self.tombstones < self.capacity);
        let mut idx = self.ideal_index(hash);
        let mut dist = 0;
        loop {
            let row = self.table[idx];
            let curr = row.hash();
            if curr == hash
                && !row.tombstone()
                && self.strategy.equals(&key, &self.entries[row.index()].0)
            {
                let slot = &mut self.entries[row.index()].1;
                return Some(std::mem::replace(slot, value));
            }

            if curr == NONE || dist > self.probe_distance(curr, idx) {
                let entry_index = self.entries.len();
                self.entries.push((key, value));
                self.table[idx] = row::construct(hash, entry_index);

                if row.tombstone() {
                    self.tombstones -= 1;
                } else if row.populated() {
                    // we deserve this slot more, the resident moves on
                    let resident_dist = self.probe_distance(curr, idx);
                    let next = self.next_index(idx);
                    self.place(next, resident_dist + 1, curr, row.index());
                }
                return None;
            }

            idx = self.next_index(idx);
            dist += 1;
        }
    }

    /// Places a row whose key is known to be absent from the table.
    fn construct_put(&mut self, hash: u32, entry_index: usize) {
        let idx = self.ideal_index(hash);
        self.place(idx, 0, hash, entry_index);
    }

    fn place(&mut self, mut idx: usize, mut dist: usize, mut hash: u32, mut entry_index: usize) {
        loop {
            let row = self.table[idx];
            let curr = row.hash();
            if curr == NONE {
                self.table[idx] = row::construct(hash, entry_index);
                return;
            }

            let curr_dist = self.probe_distance(curr, idx);
            if dist > curr_dist {
                self.table[idx] = row::construct(hash, entry_index);
                if row.tombstone() {
                    self.tombstones -= 1;
                    return;
                }
                dist = curr_dist;
                hash = curr;
                entry_index = row.index();
            }

            idx = self.next_index(idx);
            dist += 1;
        }
    }

    /// Removes `key`, returning its value.
    ///
    /// The last entry is moved into the vacated position so the entry array
    /// stays gapless.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = self.key_hash(key);
        let idx = self.find_slot(hash, key)?;
        let row = self.table[idx];
        let entry_index = row.index();
        let last = self.entries.len() - 1;

        if entry_index != last {
            let last_key = &self.entries[last].0;
            let last_hash = self.key_hash(last_key);
            let last_idx = self.find_slot(last_hash, last_key);
            debug_assert!(last_idx.is_some(), "every entry has a row");
            if let Some(last_idx) = last_idx {
                self.table[last_idx] = row::construct(last_hash, entry_index);
            }
        }

        self.table[idx] = row.add_tombstone();
        self.tombstones += 1;
        let (_, value) = self.entries.swap_remove(entry_index);
        Some(value)
    }

    fn rebuild(&mut self, capacity: usize) -> Result<()> {
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityExceeded {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }

        let capacity = capacity.max(self.entries.len()).max(MIN_CAPACITY);
        let table_len = table_length(capacity);
        debug!(
            from = self.capacity,
            to = capacity,
            table_len,
            "rebuilding linear map"
        );

        let old = std::mem::replace(
            &mut self.table,
            vec![Row::new(); table_len].into_boxed_slice(),
        );
        self.index_mask = table_len - 1;
        self.capacity = capacity;
        self.tombstones = 0;
        if capacity > self.entries.capacity() {
            self.entries.reserve_exact(capacity - self.entries.len());
        }

        // entries keep their positions, only the rows are replaced
        for row in old.iter().filter(|r| r.populated()) {
            self.construct_put(row.hash(), row.index());
        }
        Ok(())
    }

    /// Rebuilds the map with room for `capacity` entries (never fewer than
    /// it holds), discarding all tombstones. On error the map is untouched.
    pub fn resize(&mut self, capacity: usize) -> Result<()> {
        self.rebuild(capacity)
    }

    /// Splits the map into at most `parts` independent maps by scanning
    /// contiguous ranges of the probe table.
    ///
    /// Parts are only roughly balanced. An empty map, or `parts == 0`,
    /// yields the map itself as the single part.
    pub fn partition(self, parts: usize) -> Vec<Self> {
        let parts = parts.min(self.len());
        if parts == 0 {
            return vec![self];
        }

        let LinearMap {
            strategy,
            table,
            entries,
            ..
        } = self;
        let mut slots: Vec<Option<(K, V)>> = entries.into_iter().map(Some).collect();
        let part_size = table.len() / parts;
        debug!(parts, table_len = table.len(), "partitioning linear map");

        (0..parts)
            .map(|p| {
                let start = p * part_size;
                let finish = if p == parts - 1 {
                    table.len()
                } else {
                    start + part_size
                };
                let range = &table[start..finish];
                let occupancy = range.iter().filter(|r| r.populated()).count();

                let mut m = Self::alloc(occupancy, strategy.clone());
                for row in range.iter().filter(|r| r.populated()) {
                    if let Some(entry) = slots[row.index()].take() {
                        let entry_index = m.entries.len();
                        m.entries.push(entry);
                        m.construct_put(row.hash(), entry_index);
                    }
                }
                m
            })
            .collect()
    }

    /// Moves every entry of `other` into `self`, leaving `other` empty.
    ///
    /// The smaller of the two maps is folded into the larger one, so on a
    /// key collision the value from the smaller map wins; when both have the
    /// same size, the values of `other` win. Both maps must use the same
    /// strategy. On error neither map is changed.
    pub fn merge(&mut self, other: &mut Self) -> Result<()> {
        let combined = self.len() + other.len();
        if combined > MAX_CAPACITY {
            return Err(Error::CapacityExceeded {
                requested: combined,
                max: MAX_CAPACITY,
            });
        }
        if other.len() > self.len() {
            std::mem::swap(self, other);
        }
        self.rebuild(combined)?;

        let strategy = other.strategy.clone();
        let incoming = std::mem::replace(other, Self::alloc(MIN_CAPACITY, strategy));
        debug!(base = self.len(), incoming = incoming.len(), "merging linear maps");

        let LinearMap { table, entries, .. } = incoming;
        let mut slots: Vec<Option<(K, V)>> = entries.into_iter().map(Some).collect();
        for row in table.iter().filter(|r| r.populated()) {
            if let Some((k, v)) = slots[row.index()].take() {
                self.put_hashed(row.hash(), k, v);
            }
        }
        Ok(())
    }

    /// Entries of `self` whose keys are absent from `other`
    pub fn difference<W>(self, other: &LinearMap<K, W>) -> Self {
        let capacity = self.len();
        self.combine(other, capacity, |found| !found)
    }

    /// Entries of `self` whose keys are also in `other`
    pub fn intersection<W>(self, other: &LinearMap<K, W>) -> Self {
        let capacity = self.len().min(other.len());
        self.combine(other, capacity, |found| found)
    }

    fn combine<W>(
        self,
        other: &LinearMap<K, W>,
        capacity: usize,
        keep: impl Fn(bool) -> bool,
    ) -> Self {
        let LinearMap {
            strategy,
            table,
            entries,
            ..
        } = self;
        let mut slots: Vec<Option<(K, V)>> = entries.into_iter().map(Some).collect();
        let mut result = Self::alloc(capacity, strategy);

        for row in table.iter().filter(|r| r.populated()) {
            let found = match &slots[row.index()] {
                Some((k, _)) => other.find_slot(row.hash(), k).is_some(),
                None => continue,
            };
            if keep(found) {
                if let Some(entry) = slots[row.index()].take() {
                    let entry_index = result.entries.len();
                    result.entries.push(entry);
                    result.construct_put(row.hash(), entry_index);
                }
            }
        }
        result
    }

    /// A `LinearMap` has no persistent representation; this always fails.
    pub fn forked(&self) -> Result<Infallible> {
        Err(Error::Unsupported(
            "a LinearMap cannot be efficiently transformed into a forked representation",
        ))
    }

    /// Puts every pair from `iter`, stopping at the first error.
    pub fn try_extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) -> Result<()> {
        for (k, v) in iter {
            self.put(k, v)?;
        }
        Ok(())
    }

    /// Largest displacement of any live row from its ideal slot
    pub fn max_probe_distance(&self) -> usize {
        self.table
            .iter()
            .enumerate()
            .filter(|(_, r)| r.populated())
            .map(|(idx, r)| self.probe_distance(r.hash(), idx))
            .max()
            .unwrap_or(0)
    }

    /// Number of tombstoned rows waiting for the next rebuild
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }
}

impl<K, V: PartialEq> PartialEq for LinearMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V: Eq> Eq for LinearMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LinearMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> Extend<(K, V)> for LinearMap<K, V> {
    /// # Panics
    ///
    /// Panics if the map would grow past `MAX_CAPACITY`, use
    /// [`LinearMap::try_extend`] to get the error instead.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(e) = self.try_extend(iter) {
            panic!("{e}");
        }
    }
}

impl<K: Hash + Eq + 'static, V> FromIterator<(K, V)> for LinearMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let mut map = Self::alloc(lower.clamp(DEFAULT_CAPACITY, MAX_CAPACITY), Strategy::default());
        map.extend(iter);
        map
    }
}

impl<K, V> IntoIterator for LinearMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a LinearMap<K, V> {
    type Item = &'a (K, V);
    type IntoIter = std::slice::Iter<'a, (K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

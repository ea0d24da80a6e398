use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use rustc_hash::FxBuildHasher;

pub type HashFn<K> = dyn Fn(&K) -> u32 + Send + Sync;
pub type EqFn<K> = dyn Fn(&K, &K) -> bool + Send + Sync;

/// The hash function and equality predicate a map was built with.
///
/// Both are shared, so every map derived from another one (by resize,
/// partition, merge, difference or intersection) uses the very same
/// functions. `eq(a, b)` must imply `hash(a) == hash(b)`.
pub struct Strategy<K> {
    hash_fn: Arc<HashFn<K>>,
    eq_fn: Arc<EqFn<K>>,
}

impl<K> Strategy<K> {
    pub fn new<H, E>(hash_fn: H, eq_fn: E) -> Self
    where
        H: Fn(&K) -> u32 + Send + Sync + 'static,
        E: Fn(&K, &K) -> bool + Send + Sync + 'static,
    {
        Self {
            hash_fn: Arc::new(hash_fn),
            eq_fn: Arc::new(eq_fn),
        }
    }

    #[inline]
    pub fn hash(&self, key: &K) -> u32 {
        (self.hash_fn)(key)
    }

    #[inline]
    pub fn equals(&self, a: &K, b: &K) -> bool {
        (self.eq_fn)(a, b)
    }

    /// True when both strategies share the same function objects.
    pub fn same_as(&self, other: &Strategy<K>) -> bool {
        Arc::ptr_eq(&self.hash_fn, &other.hash_fn) && Arc::ptr_eq(&self.eq_fn, &other.eq_fn)
    }
}

impl<K> Clone for Strategy<K> {
    fn clone(&self) -> Self {
        Self {
            hash_fn: Arc::clone(&self.hash_fn),
            eq_fn: Arc::clone(&self.eq_fn),
        }
    }
}

impl<K: Hash + Eq + 'static> Default for Strategy<K> {
    /// `FxHash` folded down to 32 bits, and `Eq`.
    fn default() -> Self {
        Self::new(
            |key: &K| {
                let h = FxBuildHasher::default().hash_one(key);
                (h ^ (h >> 32)) as u32
            },
            |a: &K, b: &K| a == b,
        )
    }
}

impl<K> fmt::Debug for Strategy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_is_consistent() {
        let s = Strategy::<String>::default();
        let a = "hello".to_string();
        let b = "hello".to_string();
        assert!(s.equals(&a, &b));
        assert_eq!(s.hash(&a), s.hash(&b));
        assert!(!s.equals(&a, &"world".to_string()));
    }

    #[test]
    fn test_clones_share_functions() {
        let s = Strategy::<u64>::new(|k| *k as u32, |a, b| a == b);
        let c = s.clone();
        assert!(s.same_as(&c));
        assert!(!s.same_as(&Strategy::new(|k: &u64| *k as u32, |a, b| a == b)));
    }
}

use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Count per key, ordered by key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Histogram<K: Ord> {
    buckets: BTreeMap<K, u64>,
}

impl<K: Ord> Default for Histogram<K> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> Histogram<K> {
    /// Empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn increment(&mut self, key: K) {
        self.add(key, 1);
    }

    /// Add `count` observations of `key`.
    pub fn add(&mut self, key: K, count: u64) {
        if count > 0 {
            *self.buckets.entry(key).or_insert(0) += count;
        }
    }

    /// Count for a key (0 when absent).
    pub fn get(&self, key: K) -> u64 {
        self.buckets.get(&key).copied().unwrap_or(0)
    }

    /// Total observations.
    pub fn total(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, u64)> + '_ {
        self.buckets.iter().map(|(k, v)| (*k, *v))
    }

    /// Add every bucket of `other`.
    pub fn merge(mut self, other: Histogram<K>) -> Self {
        for (key, count) in other.buckets {
            self.add(key, count);
        }
        self
    }
}

impl<K: Ord + Copy> FromIterator<K> for Histogram<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut histogram = Histogram::new();
        for key in iter {
            histogram.increment(key);
        }
        histogram
    }
}

impl<K: Ord + Copy + Display> Display for Histogram<K> {
    /// One `key<TAB>count` line per bucket.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, count) in self.iter() {
            writeln!(f, "{key}\t{count}")?;
        }
        Ok(())
    }
}

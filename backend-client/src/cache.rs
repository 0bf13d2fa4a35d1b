//! Fixed-capacity LRU cache for backend responses.
//!
//! Keys are xxh3 hashes of the exact input text; both backend calls are
//! idempotent per input, so a hash collision at 64 bits is an acceptable
//! trade for not storing the texts themselves. The cache is an owned object
//! with its capacity as a constructor parameter, never a process-global.

use indexmap::IndexMap;
use xxhash_rust::xxh3::xxh3_64;

pub struct ResponseCache<T> {
    capacity: usize,
    // Insertion order doubles as recency order: hits are moved to the back,
    // evictions pop the front.
    entries: IndexMap<u64, T>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, text: &str) -> Option<T> {
        let key = xxh3_64(text.as_bytes());
        let value = self.entries.shift_remove(&key)?;
        self.entries.insert(key, value.clone());
        Some(value)
    }

    pub fn put(&mut self, text: &str, value: T) {
        if self.capacity == 0 {
            return;
        }
        let key = xxh3_64(text.as_bytes());
        self.entries.shift_remove(&key);
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let mut cache = ResponseCache::new(2);
        cache.put("안녕", 1);
        assert_eq!(cache.get("안녕"), Some(1));
        assert_eq!(cache.get("없음"), None);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = ResponseCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        // Touch "a" so "b" becomes the least recently used
        cache.get("a");
        cache.put("c", 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = ResponseCache::new(2);
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = ResponseCache::new(0);
        cache.put("a", 1);
        assert_eq!(cache.get("a"), None);
    }
}

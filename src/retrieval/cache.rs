//! Query result cache shared by concurrent searches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::types::SearchResult;

#[derive(Debug)]
struct CacheEntry {
    generation: u64,
    results: Arc<Vec<SearchResult>>,
}

/// Results keyed by exact query text and k.
///
/// Every entry is tagged with the index generation it was computed against.
/// Lookups for another generation miss, so a search that started before a
/// rebuild can never serve its results afterwards.
#[derive(Debug)]
pub struct QueryCache {
    entries: DashMap<(String, usize), CacheEntry>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Cache holding at most `capacity` queries; 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, query: &str, k: usize, generation: u64) -> Option<Arc<Vec<SearchResult>>> {
        let hit = self
            .entries
            .get(&(query.to_string(), k))
            .filter(|entry| entry.generation == generation)
            .map(|entry| Arc::clone(&entry.results));

        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Stores results unless the cache holds a newer entry for the key.
    ///
    /// A full cache first drops entries from older generations, then one
    /// arbitrary entry.
    pub fn insert(&self, query: &str, k: usize, generation: u64, results: Arc<Vec<SearchResult>>) {
        if self.capacity == 0 {
            return;
        }
        let key = (query.to_string(), k);
        // len() locks every shard, so it must not run while an entry guard is held
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.make_room(generation);
        }

        let entry = CacheEntry {
            generation,
            results,
        };
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().generation <= generation {
                    occupied.insert(entry);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    fn make_room(&self, generation: u64) {
        self.entries.retain(|_, entry| entry.generation >= generation);
        while self.entries.len() >= self.capacity {
            let Some(victim) = self.entries.iter().next().map(|e| e.key().clone()) else {
                break;
            };
            self.entries.remove(&victim);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn hit_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

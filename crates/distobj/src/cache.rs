// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retention cache for disabled objects.
//!
//! A disabled object is parked here so that a later generate for the same id
//! can revive the same instance. The cache is bounded; once full, parking
//! another object evicts and finalizes the oldest one.
//!
//! Backed by an [`LruCache`] that is only touched through non-promoting
//! calls (`push`, `pop`, `contains`), so recency order is insertion order.

use crate::object::{DistributedObject, ObjectId};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct RetentionCache {
    entries: LruCache<ObjectId, Box<dyn DistributedObject>>,
    stats: Arc<CacheStats>,
}

impl RetentionCache {
    /// Cache holding up to `capacity` objects (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains(&id)
    }

    /// Remove and return the cached object, if any.
    pub fn retrieve(&mut self, id: ObjectId) -> Option<Box<dyn DistributedObject>> {
        let object = self.entries.pop(&id)?;
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(object)
    }

    /// Park an object, evicting and finalizing the oldest entry when full.
    ///
    /// The object just inserted is never the one evicted. An id that is
    /// already cached has its previous object finalized and replaced.
    pub fn insert(&mut self, id: ObjectId, object: Box<dyn DistributedObject>) {
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
        match self.entries.push(id, object) {
            Some((old_id, mut old)) if old_id == id => {
                tracing::warn!("Object {} was already cached; finalizing previous instance", id);
                old.finalize();
            }
            Some((victim, mut evicted)) => {
                tracing::debug!("Evicting object {} from retention cache", victim);
                evicted.finalize();
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }
    }

    /// Remove and finalize a cached object. Returns false if it was absent.
    pub fn delete(&mut self, id: ObjectId) -> bool {
        match self.entries.pop(&id) {
            Some(mut object) => {
                object.finalize();
                true
            }
            None => false,
        }
    }

    /// Cached ids, oldest first.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.entries.iter().rev().map(|(id, _)| *id).collect()
    }

    /// Finalize and drop everything.
    pub fn clear(&mut self) {
        while let Some((_, mut object)) = self.entries.pop_lru() {
            object.finalize();
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }
}

impl std::fmt::Debug for RetentionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionCache")
            .field("capacity", &self.capacity())
            .field("ids", &self.ids())
            .finish()
    }
}

/// Retention cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Objects parked by a disable.
    pub insertions: AtomicU64,

    /// Objects finalized because the cache was over capacity.
    pub evictions: AtomicU64,

    /// Objects revived by a generate.
    pub hits: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub insertions: u64,
    pub evictions: u64,
    pub hits: u64,
}

impl CacheStatsSnapshot {
    /// Share of parked objects that came back.
    pub fn hit_ratio(&self) -> f64 {
        if self.insertions > 0 {
            self.hits as f64 / self.insertions as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FieldObject;
    use std::sync::atomic::AtomicBool;

    fn tracked(id: u32) -> (Box<dyn DistributedObject>, Arc<AtomicBool>) {
        let obj = FieldObject::new(ObjectId(id), "Avatar");
        let flag = obj.finalized_flag();
        (Box::new(obj), flag)
    }

    #[test]
    fn test_retrieve_returns_same_object() {
        let mut cache = RetentionCache::new(4);
        let (obj, _) = tracked(1);
        let addr = &*obj as *const dyn DistributedObject as *const u8;
        cache.insert(ObjectId(1), obj);

        let back = cache.retrieve(ObjectId(1)).unwrap();
        assert_eq!(&*back as *const dyn DistributedObject as *const u8, addr);
        assert!(!cache.contains(ObjectId(1)));
        assert!(cache.retrieve(ObjectId(1)).is_none());
    }

    #[test]
    fn test_full_cache_evicts_oldest_exactly_once() {
        let mut cache = RetentionCache::new(2);
        let (a, a_flag) = tracked(1);
        let (b, b_flag) = tracked(2);
        let (c, c_flag) = tracked(3);

        cache.insert(ObjectId(1), a);
        cache.insert(ObjectId(2), b);
        cache.insert(ObjectId(3), c);

        assert_eq!(cache.len(), 2);
        assert!(a_flag.load(Ordering::Acquire));
        assert!(!b_flag.load(Ordering::Acquire));
        assert!(!c_flag.load(Ordering::Acquire));
        assert_eq!(cache.ids(), vec![ObjectId(2), ObjectId(3)]);
        assert_eq!(cache.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_revived_then_reparked_id_counts_as_newest() {
        let mut cache = RetentionCache::new(2);
        let (a, _) = tracked(1);
        let (b, b_flag) = tracked(2);
        cache.insert(ObjectId(1), a);
        cache.insert(ObjectId(2), b);

        // 1 leaves and comes back: it is now the newest entry.
        let a = cache.retrieve(ObjectId(1)).unwrap();
        cache.insert(ObjectId(1), a);

        let (c, _) = tracked(3);
        cache.insert(ObjectId(3), c);

        assert!(b_flag.load(Ordering::Acquire));
        assert_eq!(cache.ids(), vec![ObjectId(1), ObjectId(3)]);
    }

    #[test]
    fn test_lookups_do_not_reorder_eviction() {
        let mut cache = RetentionCache::new(2);
        let (a, a_flag) = tracked(1);
        let (b, b_flag) = tracked(2);
        cache.insert(ObjectId(1), a);
        cache.insert(ObjectId(2), b);

        assert!(cache.contains(ObjectId(1)));
        let _ = cache.ids();

        let (c, _) = tracked(3);
        cache.insert(ObjectId(3), c);
        assert!(a_flag.load(Ordering::Acquire));
        assert!(!b_flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_reinsert_same_id_replaces_without_eviction() {
        let mut cache = RetentionCache::new(2);
        let (first, first_flag) = tracked(1);
        let (second, second_flag) = tracked(1);
        cache.insert(ObjectId(1), first);
        cache.insert(ObjectId(1), second);

        assert_eq!(cache.len(), 1);
        assert!(first_flag.load(Ordering::Acquire));
        assert!(!second_flag.load(Ordering::Acquire));
        assert_eq!(cache.stats().snapshot().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_keeps_new_entry() {
        let mut cache = RetentionCache::new(0);
        assert_eq!(cache.capacity(), 1);
        let (a, a_flag) = tracked(1);
        cache.insert(ObjectId(1), a);
        assert!(cache.contains(ObjectId(1)));
        assert!(!a_flag.load(Ordering::Acquire));

        let (b, _) = tracked(2);
        cache.insert(ObjectId(2), b);
        assert!(a_flag.load(Ordering::Acquire));
        assert_eq!(cache.ids(), vec![ObjectId(2)]);
    }

    #[test]
    fn test_delete_finalizes() {
        let mut cache = RetentionCache::new(3);
        let (a, a_flag) = tracked(5);
        cache.insert(ObjectId(5), a);

        assert!(cache.delete(ObjectId(5)));
        assert!(a_flag.load(Ordering::Acquire));
        assert!(!cache.delete(ObjectId(5)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_snapshot() {
        let mut cache = RetentionCache::new(1);
        let (a, _) = tracked(1);
        let (b, _) = tracked(2);
        cache.insert(ObjectId(1), a);
        cache.insert(ObjectId(2), b);
        let _ = cache.retrieve(ObjectId(2));

        let snap = cache.stats().snapshot();
        assert_eq!(snap.insertions, 2);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.hits, 1);
        assert!((snap.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }
}

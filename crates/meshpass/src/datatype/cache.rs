// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide cache of type descriptors.
//!
//! Descriptor construction happens only once per Rust type. The map is keyed
//! by `TypeId`; each entry is a `OnceLock` cell so that concurrent first
//! lookups of the same type run the builder at most once, while the map shard
//! lock is released before building. Record builders resolve their field
//! types through this same cache, so nested builds never hold a lock that a
//! child lookup needs. Entries are never evicted or mutated.

use super::descriptor::TypeDescriptor;
use crate::error::Result;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

type Slot = Arc<OnceLock<Result<Arc<TypeDescriptor>>>>;

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
    /// Build time of the most recent miss.
    pub last_miss_ns: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    last_miss_ns: AtomicU64,
}

/// Concurrent descriptor cache.
pub struct TypeCache {
    slots: DashMap<TypeId, Slot>,
    counters: Counters,
}

impl TypeCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Return the descriptor cached for `T`, building it with `build` on
    /// first use. A failed build is cached too: the descriptor of a type is
    /// a pure function of its registration.
    pub fn get_or_try_build<T, F>(&self, build: F) -> Result<Arc<TypeDescriptor>>
    where
        T: 'static,
        F: FnOnce() -> Result<TypeDescriptor>,
    {
        let key = TypeId::of::<T>();

        if let Some(hit) = self.try_peek(&key) {
            self.record_hit();
            return hit;
        }

        let slot: Slot = Arc::clone(self.slots.entry(key).or_default().value());

        let start = Instant::now();
        let mut built_here = false;
        let result = slot.get_or_init(|| {
            built_here = true;
            let built = build().map(Arc::new);
            match &built {
                Ok(desc) => log::debug!(
                    "[datatype] built descriptor '{}' ({} bytes, {} blocks)",
                    desc.name(),
                    desc.size(),
                    desc.type_map().blocks().len()
                ),
                Err(e) => log::debug!(
                    "[datatype] descriptor for {} failed: {}",
                    std::any::type_name::<T>(),
                    e
                ),
            }
            built
        });

        if built_here {
            self.record_miss(start);
        } else {
            self.record_hit();
        }
        result.clone()
    }

    /// Number of types resolved so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of the counters. Fields are read one by one, so a snapshot
    /// taken during lookups may mix two moments.
    #[must_use]
    pub fn stats(&self) -> LookupStats {
        LookupStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            last_miss_ns: self.counters.last_miss_ns.load(Ordering::Relaxed),
        }
    }

    fn try_peek(&self, key: &TypeId) -> Option<Result<Arc<TypeDescriptor>>> {
        let slot = self.slots.get(key)?;
        slot.get().cloned()
    }

    #[inline]
    fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, start: Instant) {
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.last_miss_ns.store(elapsed, Ordering::Relaxed);
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The cache behind [`Datatype::descriptor`](super::Datatype::descriptor).
pub fn global() -> &'static TypeCache {
    static CACHE: OnceLock<TypeCache> = OnceLock::new();
    CACHE.get_or_init(TypeCache::new)
}

//! nestfilter store: projection results memoized per (root type, selector list).

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics::{counter, histogram};
use nestfilter_core::{ProjectionResult, Reflect, TypeKey, TypeRef};
use nestfilter_schema::{SchemaCache, SchemaError};
use nestfilter_select::{parse_all, projection, Selector};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace, warn};

pub mod config;

pub use config::{CacheConfig, KeyOrder};

/// Cache key: the root type plus the parsed selectors.
///
/// Selector strings that parse to the same segments (`"a"`, `" a."`) share one key.
/// Request order is kept unless the cache sorts keys, see [`KeyOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    root: TypeKey,
    selectors: Arc<[Selector]>,
}

impl ProjectionKey {
    pub fn new<S: AsRef<str>>(root: TypeKey, selectors: &[S], order: KeyOrder) -> Self {
        let mut parsed = parse_all(selectors);
        if order == KeyOrder::Sorted {
            parsed.sort_unstable();
            parsed.dedup();
        }
        Self { root, selectors: parsed.into() }
    }

    pub fn root(&self) -> TypeKey { self.root }

    pub fn selectors(&self) -> &[Selector] { &self.selectors }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Memo of flattened projections, safe to share across threads.
///
/// Lookups read a lock-free snapshot. A miss computes the projection outside any lock and
/// publishes it with a copy-on-write swap of the map, whose keys and values are shared
/// `Arc`s; concurrent misses on one key compute equal results and the last publish wins.
/// Once `max_entries` results are cached, further misses are computed and returned but not
/// cached. Published results are never mutated.
pub struct ProjectionCache {
    schemas: Arc<SchemaCache>,
    entries: ArcSwap<FxHashMap<Arc<ProjectionKey>, Arc<ProjectionResult>>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ProjectionCache {
    fn default() -> Self { Self::new() }
}

impl ProjectionCache {
    pub fn new() -> Self { Self::with_config(CacheConfig::default()) }

    pub fn with_config(config: CacheConfig) -> Self { Self::with_schemas(Arc::new(SchemaCache::new()), config) }

    /// Share one schema cache between several projection caches.
    pub fn with_schemas(schemas: Arc<SchemaCache>, config: CacheConfig) -> Self {
        Self {
            schemas,
            entries: ArcSwap::from_pointee(FxHashMap::default()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache configured from `NESTFILTER_*` environment variables.
    pub fn from_env() -> Self { Self::with_config(CacheConfig::from_env()) }

    pub fn schemas(&self) -> &Arc<SchemaCache> { &self.schemas }

    pub fn config(&self) -> &CacheConfig { &self.config }

    pub fn get_or_compute<T: Reflect, S: AsRef<str>>(&self, selectors: &[S]) -> Result<Arc<ProjectionResult>, SchemaError> {
        self.get_or_compute_for(&TypeRef::of::<T>(), selectors)
    }

    pub fn get_or_compute_for<S: AsRef<str>>(
        &self,
        root: &TypeRef,
        selectors: &[S],
    ) -> Result<Arc<ProjectionResult>, SchemaError> {
        let key = ProjectionKey::new(root.key(), selectors, self.config.key_order);
        if let Some(found) = self.entries.load().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("nestfilter_projection_cache_hits_total", 1u64);
            trace!(root = %key.root, "projection cache hit");
            return Ok(Arc::clone(found));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("nestfilter_projection_cache_misses_total", 1u64);
        let started = Instant::now();

        let schema = self.schemas.schema_of(root)?;
        let result = Arc::new(projection(schema.tree(), key.selectors()));

        histogram!("nestfilter_projection_build_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(root = %key.root, selectors = ?key.selectors, types = result.len(), "projection computed");

        let key = Arc::new(key);
        let cap = self.config.max_entries;
        let mut cached = false;
        self.entries.rcu(|cur| {
            cached = cur.len() < cap || cur.contains_key(&*key);
            if !cached {
                return Arc::clone(cur);
            }
            let mut next = (**cur).clone();
            next.insert(Arc::clone(&key), Arc::clone(&result));
            Arc::new(next)
        });
        if !cached {
            counter!("nestfilter_projection_cache_uncached_total", 1u64);
            warn!(root = %key.root, max_entries = cap, "projection cache full; result not cached");
        }
        Ok(result)
    }

    /// Cached result without computing on a miss.
    pub fn peek<T: Reflect, S: AsRef<str>>(&self, selectors: &[S]) -> Option<Arc<ProjectionResult>> {
        let key = ProjectionKey::new(TypeKey::of::<T>(), selectors, self.config.key_order);
        self.entries.load().get(&key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.load().len(),
        }
    }

    pub fn len(&self) -> usize { self.entries.load().len() }

    pub fn is_empty(&self) -> bool { self.entries.load().is_empty() }

    /// Drop every cached projection. Schemas stay cached.
    pub fn clear(&self) { self.entries.store(Arc::new(FxHashMap::default())); }
}

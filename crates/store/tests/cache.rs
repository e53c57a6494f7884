use std::sync::Arc;

use nestfilter_core::{reflect_object, Property, Reflect, Shape, TypeRef};
use nestfilter_schema::{SchemaCache, SchemaError};
use nestfilter_store::{CacheConfig, KeyOrder, ProjectionCache};

struct Leaf;
struct Mid;
struct Root;
struct Broken;
struct Handle;

reflect_object!(Leaf { a: String, b: Option<i32> });
reflect_object!(Mid { a: String, b: i32, c: Leaf });
reflect_object!(Root { a: String, b: i32, c: Mid });

impl Reflect for Handle {
    fn shape() -> Shape { Shape::Opaque }
}

impl Reflect for Broken {
    fn shape() -> Shape { Shape::object([Property::new::<String>("name"), Property::new::<Handle>("handle")]) }
}

#[test]
fn repeated_request_is_a_hit_returning_the_same_result() {
    let cache = ProjectionCache::new();
    let first = cache.get_or_compute::<Root, _>(&["a", "c.*"]).unwrap();
    let second = cache.get_or_compute::<Root, _>(&["a", "c.*"]).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    assert!(cache.peek::<Root, _>(&["a", "c.*"]).is_some());
    assert!(cache.peek::<Root, _>(&["a"]).is_none());
}

#[test]
fn cached_result_matches_the_projection() {
    let cache = ProjectionCache::new();
    let result = cache.get_or_compute::<Root, _>(&["a", "c.c", "c.a"]).unwrap();
    let names = |ty| result.allowed(ty).map(|s| s.iter().copied().collect::<Vec<_>>());
    assert_eq!(names(std::any::TypeId::of::<Root>()), Some(vec!["a", "c"]));
    assert_eq!(names(std::any::TypeId::of::<Mid>()), Some(vec!["a", "c"]));
    assert_eq!(names(std::any::TypeId::of::<Leaf>()), Some(vec![]));
}

#[test]
fn reordered_selectors_miss_by_default_but_agree() {
    let cache = ProjectionCache::new();
    let ab = cache.get_or_compute::<Root, _>(&["a", "c.b"]).unwrap();
    let ba = cache.get_or_compute::<Root, _>(&["c.b", "a"]).unwrap();
    assert!(!Arc::ptr_eq(&ab, &ba));
    assert_eq!(*ab, *ba);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn sorted_key_order_shares_reordered_requests() {
    let cache = ProjectionCache::with_config(CacheConfig::default().with_key_order(KeyOrder::Sorted));
    let ab = cache.get_or_compute::<Root, _>(&["a", "c.b"]).unwrap();
    let ba = cache.get_or_compute::<Root, _>(&["c.b", "a", "a"]).unwrap();
    assert!(Arc::ptr_eq(&ab, &ba));
    assert_eq!(cache.len(), 1);
}

#[test]
fn root_type_is_part_of_the_key() {
    let cache = ProjectionCache::new();
    let root = cache.get_or_compute::<Root, _>(&["a"]).unwrap();
    let mid = cache.get_or_compute::<Mid, _>(&["a"]).unwrap();
    assert!(root.allowed_for::<Root>().is_some());
    assert!(mid.allowed_for::<Root>().is_none());
    assert_eq!(cache.len(), 2);
}

#[test]
fn failures_are_reported_and_not_cached() {
    let cache = ProjectionCache::new();
    let err = cache.get_or_compute::<Broken, _>(&["name"]).unwrap_err();
    assert!(matches!(err, SchemaError::Inaccessible { attribute: "handle", .. }));
    assert!(cache.is_empty());
    assert!(cache.get_or_compute_for(&TypeRef::of::<Broken>(), &["name"]).is_err());
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn caches_can_share_one_schema_memo() {
    let schemas = Arc::new(SchemaCache::new());
    let a = ProjectionCache::with_schemas(Arc::clone(&schemas), CacheConfig::default());
    let b = ProjectionCache::with_schemas(Arc::clone(&schemas), CacheConfig::default());
    a.get_or_compute::<Root, _>(&["a"]).unwrap();
    b.get_or_compute::<Root, _>(&["b"]).unwrap();
    assert_eq!(schemas.root_count(), 1);
    assert!(Arc::ptr_eq(a.schemas(), b.schemas()));
}

#[test]
fn clear_drops_projections_but_keeps_schemas() {
    let cache = ProjectionCache::new();
    cache.get_or_compute::<Root, _>(&["*"]).unwrap();
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.schemas().root_count(), 1);
    cache.get_or_compute::<Root, _>(&["*"]).unwrap();
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn parse_equivalent_selectors_share_one_entry() {
    let cache = ProjectionCache::new();
    let plain = cache.get_or_compute::<Root, _>(&["a", "c.c.b"]).unwrap();
    let noisy = cache.get_or_compute::<Root, _>(&[" a.", ".c..c.b "]).unwrap();
    assert!(Arc::ptr_eq(&plain, &noisy));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn full_cache_serves_new_results_without_caching_them() {
    let cache = ProjectionCache::with_config(CacheConfig::default().with_max_entries(2));
    for i in 0..10 {
        let name = format!("a{}", i);
        let result = cache.get_or_compute::<Root, _>(&[name.as_str()]).unwrap();
        assert_eq!(result.allowed_for::<Root>().map(|s| s.len()), Some(0));
    }
    assert_eq!(cache.len(), 2);

    // Results already cached keep hitting; overflow requests recompute each time.
    let first = cache.get_or_compute::<Root, _>(&["a0"]).unwrap();
    assert!(Arc::ptr_eq(&first, &cache.get_or_compute::<Root, _>(&["a0"]).unwrap()));
    let overflow = cache.get_or_compute::<Root, _>(&["b"]).unwrap();
    assert!(overflow.allowed_for::<Root>().unwrap().contains("b"));
    assert!(cache.peek::<Root, _>(&["b"]).is_none());
    assert_eq!(cache.stats(), nestfilter_store::CacheStats { hits: 2, misses: 11, entries: 2 });
}

#[test]
fn many_distinct_misses_stay_bounded() {
    let cache = ProjectionCache::with_config(CacheConfig::default().with_max_entries(64));
    for i in 0..5_000 {
        cache.get_or_compute::<Root, _>(&[format!("a{}", i)]).unwrap();
    }
    assert_eq!(cache.len(), 64);
    assert_eq!(cache.stats().misses, 5_000);
}

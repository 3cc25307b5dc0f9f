//! Property tests for the cache tier laws.

use panel_core::CacheKey;
use panel_storage::{CacheConfig, ResponseCache, StartupCache};
use proptest::prelude::*;
use serde_json::{json, Value};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A cache never holds more than its ceiling after a store, and the
    /// entry just stored always hits, whatever the margin.
    #[test]
    fn prop_eviction_respects_ceiling(
        max in 1usize..40,
        margin in 0usize..60,
        extra in 1usize..40,
    ) {
        let cache = ResponseCache::new(
            CacheConfig::new().with_max_entries(max).with_eviction_margin(margin),
        );
        let total = max + extra;
        for i in 0..total {
            let key = CacheKey::new(format!("k{}", i));
            let summary = json!({"i": i});
            cache.store(key.clone(), Some(&summary), json!(i));
            prop_assert!(cache.len() <= max);
            prop_assert_eq!(cache.should_use_cache(&key, Some(&summary)), Some(json!(i)));
        }
    }

    /// With no margin, exactly the `max` most recent keys are retained.
    #[test]
    fn prop_zero_margin_retains_most_recent(max in 1usize..30, extra in 1usize..30) {
        let cache = ResponseCache::new(CacheConfig::new().with_max_entries(max).with_eviction_margin(0));
        let total = max + extra;
        for i in 0..total {
            cache.store::<Value>(CacheKey::new(format!("k{}", i)), None, json!(i));
        }
        prop_assert_eq!(cache.len(), max);
        for i in (total - max)..total {
            let present = cache.contains(&CacheKey::new(format!("k{}", i)));
            prop_assert!(present);
        }
    }

    /// The first value written to the startup tier is the one served forever.
    #[test]
    fn prop_startup_once(endpoint in "/api/[a-z]{1,8}", values in prop::collection::vec(any::<i64>(), 1..10)) {
        let cache = StartupCache::new();
        for v in &values {
            cache.set(&endpoint, json!(*v));
        }
        prop_assert_eq!(cache.get(&endpoint), Some(json!(values[0])));
    }

    /// Same summary hits, any changed summary misses.
    #[test]
    fn prop_fingerprint_staleness(a in any::<i64>(), b in any::<i64>()) {
        let cache: ResponseCache = ResponseCache::default();
        let key = CacheKey::new("chart:A");
        cache.store(key.clone(), Some(&json!({"t": a})), json!("P"));

        prop_assert_eq!(cache.should_use_cache(&key, Some(&json!({"t": a}))), Some(json!("P")));
        if a != b {
            let miss = cache.should_use_cache(&key, Some(&json!({"t": b}))).is_none();
            prop_assert!(miss);
        }
    }
}

#[test]
fn end_to_end_store_and_revalidate() {
    let cache: ResponseCache = ResponseCache::default();
    let key = CacheKey::new("chart:A");

    cache.store(key.clone(), Some(&json!({"t": 1})), json!("P1"));
    assert_eq!(cache.should_use_cache(&key, Some(&json!({"t": 1}))), Some(json!("P1")));

    cache.store(key.clone(), Some(&json!({"t": 2})), json!("P2"));
    assert!(cache.should_use_cache(&key, Some(&json!({"t": 1}))).is_none());
    assert_eq!(cache.should_use_cache(&key, Some(&json!({"t": 2}))), Some(json!("P2")));
}

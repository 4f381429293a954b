//! Stampede suppression and negative caching under concurrency.

mod support;

use std::sync::Arc;
use std::time::Duration;

use stratum_cache::{CacheConfig, CacheStatus, StratumCache};
use support::{CountingSource, MockRemoteStore};

async fn build_cache(
    config: CacheConfig,
    source: Arc<CountingSource<String>>,
    remote: Arc<MockRemoteStore>,
) -> StratumCache<String> {
    StratumCache::builder("products")
        .config(config)
        .source(source)
        .remote_store(remote)
        .build()
        .await
        .expect("engine builds")
}

#[tokio::test]
async fn test_single_flight_in_process() {
    let remote = MockRemoteStore::new();
    let source = CountingSource::with_delay(Duration::from_millis(50));
    source.insert("7", "loaded".to_string());
    let cache = build_cache(CacheConfig::default(), Arc::clone(&source), remote).await;

    let mut tasks = Vec::new();
    for _ in 0..100 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.get_or_load(&7u64, None).await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(
            task.await.unwrap(),
            CacheStatus::Found("loaded".to_string())
        );
    }
    // All hundred callers shared one load.
    assert_eq!(source.queries(), 1);
}

#[tokio::test]
async fn test_single_flight_across_engines_via_remote_lock() {
    // Two engines with separate L1s and lock tables, sharing one remote
    // store and one data source: the closest a test gets to two processes.
    let remote = MockRemoteStore::new();
    let source = CountingSource::with_delay(Duration::from_millis(50));
    source.insert("7", "loaded".to_string());

    let mut config = CacheConfig::default();
    config.locks.remote = true;

    let engine_a = build_cache(config.clone(), Arc::clone(&source), Arc::clone(&remote)).await;
    let engine_b = build_cache(config, Arc::clone(&source), Arc::clone(&remote)).await;

    let mut tasks = Vec::new();
    for engine in [engine_a, engine_b] {
        for _ in 0..10 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                engine.get_or_load(&7u64, None).await.unwrap()
            }));
        }
    }
    for task in tasks {
        assert_eq!(
            task.await.unwrap(),
            CacheStatus::Found("loaded".to_string())
        );
    }
    // The remote lock plus the triple-check kept the load cluster-unique.
    assert_eq!(source.queries(), 1);
}

#[tokio::test]
async fn test_negative_caching_cycle() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    let mut config = CacheConfig::default();
    config.negative_cache.ttl_ms = 500;
    let cache = build_cache(config, Arc::clone(&source), remote).await;

    // The key does not exist; the miss is cached as a tombstone.
    assert_eq!(
        cache.get_or_load(&"missing", None).await.unwrap(),
        CacheStatus::KnownAbsent
    );
    assert_eq!(source.queries(), 1);

    // Within the negative TTL the source is left alone.
    assert_eq!(
        cache.get_or_load(&"missing", None).await.unwrap(),
        CacheStatus::KnownAbsent
    );
    assert_eq!(source.queries(), 1);

    // After the tombstone expires the source is asked again.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        cache.get_or_load(&"missing", None).await.unwrap(),
        CacheStatus::KnownAbsent
    );
    assert_eq!(source.queries(), 2);
}

#[tokio::test]
async fn test_negative_caching_disabled_reloads_every_time() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    let mut config = CacheConfig::default();
    config.negative_cache.enabled = false;
    let cache = build_cache(config, Arc::clone(&source), remote).await;

    assert_eq!(
        cache.get_or_load(&"missing", None).await.unwrap(),
        CacheStatus::NotFound
    );
    assert_eq!(
        cache.get_or_load(&"missing", None).await.unwrap(),
        CacheStatus::NotFound
    );
    assert_eq!(source.queries(), 2);
}

#[tokio::test]
async fn test_lock_timeout_degrades_to_unlocked_load() {
    let remote = MockRemoteStore::new();
    // The load takes four times the lock wait budget.
    let source = CountingSource::with_delay(Duration::from_millis(200));
    source.insert("7", "loaded".to_string());
    let mut config = CacheConfig::default();
    config.locks.wait_budget_ms = 50;
    let cache = build_cache(config, Arc::clone(&source), remote).await;

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_or_load(&7u64, None).await.unwrap() })
    };
    // Give the first task time to take the slot and start loading.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get_or_load(&7u64, None).await.unwrap() })
    };

    // Both complete with the value; the second gave up on the lock and
    // loaded on its own rather than erroring out.
    assert_eq!(first.await.unwrap(), CacheStatus::Found("loaded".to_string()));
    assert_eq!(second.await.unwrap(), CacheStatus::Found("loaded".to_string()));
    assert_eq!(source.queries(), 2);
}

#[tokio::test]
async fn test_data_source_error_propagates_and_is_not_cached() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    source.set_failing(true);
    let cache = build_cache(CacheConfig::default(), Arc::clone(&source), remote).await;

    let err = cache.get_or_load(&1u64, None).await.unwrap_err();
    assert!(err.is_data_source());

    // The failure was not cached as a tombstone; recovery is immediate.
    source.set_failing(false);
    source.insert("1", "recovered".to_string());
    assert_eq!(
        cache.get_or_load(&1u64, None).await.unwrap(),
        CacheStatus::Found("recovered".to_string())
    );
}

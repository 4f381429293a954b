//! Background refresh loop integration tests.

mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use stratum_cache::{CacheConfig, CacheStatus, StratumCache};
use support::{CountingSource, MockRemoteStore};

fn refresh_config(interval_ms: u64) -> CacheConfig {
    let mut config = CacheConfig::default();
    config.refresh.enabled = true;
    config.refresh.default_interval_ms = interval_ms;
    config
}

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

fn encode(value: &str) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

/// Polls until the condition holds or the deadline passes.
async fn eventually(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

#[tokio::test]
async fn test_refresh_picks_up_external_l2_write() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    let cache = build_cache(refresh_config(200), source, Arc::clone(&remote)).await;

    cache.put(&1u64, &"v1".to_string(), None).await.unwrap();

    // Another instance overwrites L2 behind this engine's back.
    remote.seed("products:1", encode("v2"), Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(cache.get(&1u64).await, CacheStatus::Found("v2".to_string()));
}

#[tokio::test]
async fn test_refresh_falls_back_to_source_when_l2_is_empty() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    source.insert("1", "fresh".to_string());
    let cache = build_cache(refresh_config(200), Arc::clone(&source), Arc::clone(&remote)).await;

    cache.put(&1u64, &"stale".to_string(), None).await.unwrap();
    remote.wipe("products:1");

    let refreshed = eventually(Duration::from_secs(2), || source.queries() >= 1).await;
    assert!(refreshed, "refresh never reached the data source");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        cache.get(&1u64).await,
        CacheStatus::Found("fresh".to_string())
    );
}

#[tokio::test]
async fn test_put_tracks_and_invalidate_untracks() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    // A long interval: tracking state is observable without refreshes firing.
    let cache = build_cache(refresh_config(60_000), source, remote).await;

    cache.put(&1u64, &"v".to_string(), None).await.unwrap();
    assert_eq!(cache.stats().refresh_tracked, 1);

    cache.invalidate(&1u64).await;
    assert_eq!(cache.stats().refresh_tracked, 0);
}

#[tokio::test]
async fn test_replacing_a_value_keeps_tracking() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    let cache = build_cache(refresh_config(60_000), source, remote).await;

    cache.put(&1u64, &"v1".to_string(), None).await.unwrap();
    cache.put(&1u64, &"v2".to_string(), None).await.unwrap();

    // Replacement is not an eviction; the record survives.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(cache.stats().refresh_tracked, 1);
}

#[tokio::test]
async fn test_refresh_failure_is_isolated_and_leaves_entry_untouched() {
    let remote = MockRemoteStore::new();
    let source: Arc<CountingSource<String>> = CountingSource::new();
    let cache = build_cache(refresh_config(200), Arc::clone(&source), Arc::clone(&remote)).await;

    // Key 1 refreshes from L2; key 2 has nothing in L2 and a failing source.
    cache.put(&1u64, &"a1".to_string(), None).await.unwrap();
    cache.put(&2u64, &"b1".to_string(), None).await.unwrap();
    remote.seed("products:1", encode("a2"), Duration::from_secs(60));
    remote.wipe("products:2");
    source.set_failing(true);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut key1_refreshed = false;
    while Instant::now() < deadline {
        if cache.get(&1u64).await == CacheStatus::Found("a2".to_string()) {
            key1_refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(key1_refreshed, "healthy key stopped refreshing");

    // The failing key's entry is untouched, and the loop kept running.
    assert_eq!(cache.get(&2u64).await, CacheStatus::Found("b1".to_string()));
    assert!(source.queries() >= 1);
}

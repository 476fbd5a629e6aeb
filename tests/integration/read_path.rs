//! End-to-end behaviour of the coalesced cache-aside read path

use async_trait::async_trait;
use futures_util::future::join_all;
use herdcache::cache::{CacheStore, MemoryCache};
use herdcache::metrics::CacheMetrics;
use herdcache::store::{Customer, MemoryStore, RecordStore};
use herdcache::{CacheAsideReader, HerdError, HerdResult, KeyedCoalescer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache whose writes always fail, reads always miss
struct UnavailableCache {
    writes: AtomicU32,
}

#[async_trait]
impl CacheStore for UnavailableCache {
    async fn get(&self, _key: &str) -> HerdResult<Option<Vec<u8>>> {
        Err(HerdError::backend("cache", "connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> HerdResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(HerdError::backend("cache", "connection refused"))
    }

    async fn expire(&self, _key: &str) -> HerdResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

/// Store that is slow only for keys starting with `slow`
struct SplitLatencyStore {
    inner: MemoryStore<Customer>,
}

#[async_trait]
impl RecordStore<Customer> for SplitLatencyStore {
    async fn lookup(&self, key: &str) -> HerdResult<Customer> {
        if key.starts_with("slow") {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        self.inner.lookup(key).await
    }

    fn backend_name(&self) -> &'static str {
        "split-latency"
    }
}

async fn seeded_store(latency: Duration) -> Arc<MemoryStore<Customer>> {
    let store = MemoryStore::new().with_latency(latency);
    store.insert("abc", Customer::new("abc", "active")).await;
    Arc::new(store)
}

fn reader_over(
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RecordStore<Customer>>,
    ttl: Duration,
) -> Arc<CacheAsideReader<Customer>> {
    Arc::new(CacheAsideReader::new(
        cache,
        store,
        KeyedCoalescer::new(),
        CacheMetrics::new().unwrap(),
        ttl,
    ))
}

async fn concurrent_gets(
    reader: &Arc<CacheAsideReader<Customer>>,
    key: &str,
    n: usize,
) -> Vec<HerdResult<Customer>> {
    let tasks = (0..n).map(|_| {
        let reader = Arc::clone(reader);
        let key = key.to_string();
        tokio::spawn(async move { reader.get(&key).await })
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn hundred_concurrent_misses_cost_one_lookup_and_one_write() {
    let store = seeded_store(Duration::from_millis(100)).await;
    let cache = Arc::new(MemoryCache::new(1_000));
    let reader = reader_over(cache.clone(), store.clone(), Duration::from_secs(60));

    let results = concurrent_gets(&reader, "abc", 100).await;

    assert_eq!(results.len(), 100);
    for result in results {
        assert_eq!(result.unwrap(), Customer::new("abc", "active"));
    }
    assert_eq!(store.lookups(), 1);
    assert_eq!(reader.metrics().hydrations.get(), 1);
    assert!(cache.get("abc").await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cached_value_never_reaches_store() {
    let store = seeded_store(Duration::ZERO).await;
    let reader = reader_over(
        Arc::new(MemoryCache::new(1_000)),
        store.clone(),
        Duration::from_secs(60),
    );

    reader.get("abc").await.unwrap();
    let results = concurrent_gets(&reader, "abc", 50).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(store.lookups(), 1);
    assert_eq!(reader.metrics().hits.get(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn expiry_triggers_exactly_one_refetch() {
    let store = seeded_store(Duration::from_millis(50)).await;
    let reader = reader_over(
        Arc::new(MemoryCache::new(1_000)),
        store.clone(),
        Duration::from_millis(100),
    );

    reader.get("abc").await.unwrap();
    assert_eq!(store.lookups(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let results = concurrent_gets(&reader, "abc", 20).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(store.lookups(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn unavailable_cache_does_not_fail_reads() {
    let store = seeded_store(Duration::from_millis(50)).await;
    let cache = Arc::new(UnavailableCache {
        writes: AtomicU32::new(0),
    });
    let reader = reader_over(cache.clone(), store.clone(), Duration::from_secs(60));

    let results = concurrent_gets(&reader, "abc", 10).await;

    for result in results {
        assert_eq!(result.unwrap().status, "active");
    }
    assert_eq!(store.lookups(), 1);
    assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
    assert_eq!(reader.metrics().hydrations.get(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn not_found_is_shared_then_retried() {
    let store = seeded_store(Duration::from_millis(100)).await;
    let reader = reader_over(
        Arc::new(MemoryCache::new(1_000)),
        store.clone(),
        Duration::from_secs(60),
    );

    let results = concurrent_gets(&reader, "ghost", 25).await;
    for result in &results {
        assert!(matches!(result, Err(HerdError::NotFound { key }) if key == "ghost"));
    }
    assert_eq!(store.lookups(), 1);

    // The failure was not remembered; once the record exists it is served.
    store.insert("ghost", Customer::new("ghost", "active")).await;
    assert_eq!(reader.get("ghost").await.unwrap().status, "active");
    assert_eq!(store.lookups(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn slow_key_does_not_delay_other_keys() {
    let inner = MemoryStore::new();
    inner.insert("slow", Customer::new("slow", "active")).await;
    inner.insert("fast", Customer::new("fast", "active")).await;
    let reader = reader_over(
        Arc::new(MemoryCache::new(1_000)),
        Arc::new(SplitLatencyStore { inner }),
        Duration::from_secs(60),
    );

    let slow = {
        let reader = Arc::clone(&reader);
        tokio::spawn(async move { reader.get("slow").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert_eq!(reader.get("fast").await.unwrap().id, "fast");
    assert!(started.elapsed() < Duration::from_millis(250));

    assert_eq!(slow.await.unwrap().unwrap().id, "slow");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn impatient_caller_does_not_cancel_fetch() {
    let store = seeded_store(Duration::from_millis(200)).await;
    let reader = reader_over(
        Arc::new(MemoryCache::new(1_000)),
        store.clone(),
        Duration::from_secs(60),
    );

    let patient = {
        let reader = Arc::clone(&reader);
        tokio::spawn(async move { reader.get("abc").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let impatient = reader
        .get_with_timeout("abc", Duration::from_millis(10))
        .await;
    assert!(matches!(impatient, Err(HerdError::DeadlineExceeded { .. })));

    assert_eq!(patient.await.unwrap().unwrap().status, "active");
    assert_eq!(store.lookups(), 1);
}

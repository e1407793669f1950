//! Cache backend integration tests

use std::sync::Arc;
use std::time::Duration;

use voxquery::cache::{self, CacheBackend, MemoryCache, SqliteCache};
use voxquery::config::CacheConfig;
use voxquery::{ResultCache, SearchQuery};

mod common;
use common::hits;

fn q(text: &str) -> SearchQuery {
    SearchQuery::new(text).unwrap()
}

#[tokio::test]
async fn test_sqlite_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = SqliteCache::open(&path).unwrap();
        cache
            .put(&q("receitas veganas"), &hits(3), Duration::from_secs(60))
            .await
            .unwrap();
    }

    let reopened = SqliteCache::open(&path).unwrap();
    assert_eq!(
        reopened.get(&q("Receitas   Veganas")).await.unwrap(),
        Some(hits(3))
    );
}

#[tokio::test]
async fn test_sqlite_expired_entries_are_absent() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open(dir.path().join("cache.db")).unwrap();

    cache.put(&q("cats"), &hits(1), Duration::ZERO).await.unwrap();
    assert_eq!(cache.get(&q("cats")).await.unwrap(), None);
}

#[tokio::test]
async fn test_open_creates_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig {
        backend: CacheBackend::Sqlite,
        path: dir.path().join("nested").join("voxquery").join("cache.db"),
        ttl: Duration::from_secs(60),
        capacity: 16,
    };

    let cache = cache::open(&config).unwrap();
    assert_eq!(cache.backend(), "sqlite");
    assert!(cache.health_check().await);
    assert!(config.path.exists());
}

#[tokio::test]
async fn test_memory_backend_from_config() {
    let config = CacheConfig {
        backend: CacheBackend::Memory,
        path: "/nonexistent/never-created.db".into(),
        ttl: Duration::from_secs(60),
        capacity: 16,
    };

    let cache = cache::open(&config).unwrap();
    assert_eq!(cache.backend(), "memory");
    assert!(cache.health_check().await);
}

#[tokio::test]
async fn test_bench_reports_every_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open(dir.path().join("cache.db")).unwrap();

    let report = cache::bench(&cache, 5).await.unwrap();
    assert_eq!(report.iterations, 5);
    assert!(report.mean_read() <= report.read);

    // The probe entry does not linger
    assert_eq!(cache.get(&q(cache::HEALTH_PROBE_KEY)).await.unwrap(), None);
}

/// Many tasks writing and reading one shared key and one key each
async fn concurrent_round_trips(cache: Arc<dyn ResultCache>) {
    let mut handles = Vec::new();
    for task in 0..32usize {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let n = task % 3 + 1;
            let own = q(&format!("task {task}"));
            for _ in 0..10 {
                cache
                    .put(&q("shared"), &hits(n), Duration::from_secs(60))
                    .await
                    .unwrap();
                cache.put(&own, &hits(n), Duration::from_secs(60)).await.unwrap();

                // Whole result sets only, never a mix of writers
                if let Some(read) = cache.get(&q("shared")).await.unwrap() {
                    assert!((1..=3).contains(&read.len()));
                    assert_eq!(read, hits(read.len()));
                }
                assert_eq!(cache.get(&own).await.unwrap(), Some(hits(n)));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_sqlite_concurrent_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SqliteCache::open(dir.path().join("cache.db")).unwrap();
    concurrent_round_trips(Arc::new(cache)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_memory_concurrent_put_get() {
    concurrent_round_trips(Arc::new(MemoryCache::default())).await;
}

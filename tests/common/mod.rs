// tests/common/mod.rs
//
// Shared fixtures for the integration tests: an in-memory bucket layout and
// a client wired to it with millisecond retry backoffs.

#![allow(dead_code)]

use bucketwalk::{EngineConfig, ListItem, MemoryStore, RetryConfig, StorageClient};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Engine config with fast, deterministic retries.
pub fn fast_config() -> EngineConfig {
    EngineConfig::default().with_retry(
        RetryConfig::new()
            .with_initial_backoff_ms(1)
            .with_max_backoff_ms(5)
            .with_jitter(false),
    )
}

/// `bkt` holds `a/1.txt (10)`, `a/2.txt (20)`, `b/3.txt (30)`.
pub fn small_bucket() -> Arc<MemoryStore> {
    let now = Utc::now();
    Arc::new(
        MemoryStore::new()
            .with_sized_object("bkt", "a/1.txt", 10, now)
            .with_sized_object("bkt", "a/2.txt", 20, now)
            .with_sized_object("bkt", "b/3.txt", 30, now),
    )
}

/// A deeper tree with mixed sizes and ages.
///
/// ```text
/// data/
///   readme.md              100 B   now
///   2024/
///     jan/x                100 B   2 days old
///     jan/y.csv           4096 B   2 days old
///     feb/x                  5 B   1 hour old
///   2025/
///     x                 2 MiB      now
///   logs/                (empty after filters; holds one 0-byte file)
///     empty.log              0 B   30 days old
/// ```
pub fn nested_bucket() -> Arc<MemoryStore> {
    let now = Utc::now();
    Arc::new(
        MemoryStore::new()
            .with_sized_object("data", "readme.md", 100, now)
            .with_sized_object("data", "2024/jan/x", 100, now - Duration::days(2))
            .with_sized_object("data", "2024/jan/y.csv", 4096, now - Duration::days(2))
            .with_sized_object("data", "2024/feb/x", 5, now - Duration::hours(1))
            .with_sized_object("data", "2025/x", 2 * 1024 * 1024, now)
            .with_sized_object("data", "logs/empty.log", 0, now - Duration::days(30)),
    )
}

pub fn client_for(store: Arc<MemoryStore>) -> StorageClient {
    StorageClient::with_store(fast_config(), store)
}

pub fn names(items: &[ListItem]) -> Vec<String> {
    items.iter().map(|i| i.name().to_string()).collect()
}

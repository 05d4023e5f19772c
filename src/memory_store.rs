// src/memory_store.rs
//
// In-process backend: deterministic listings for tests and for embedding
// bucketwalk where no real storage is wanted.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::constants::PATH_DELIMITER;
use crate::error::{Result, StoreError};
use crate::object_store::{BucketEntry, ListPage, ObjectEntry, ObjectStore, PaginationToken};

#[derive(Debug, Clone)]
struct MemObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct MemBucket {
    name: String,
    created: DateTime<Utc>,
    objects: BTreeMap<String, MemObject>,
}

/// Buckets keep insertion order; keys within a bucket are sorted.
///
/// Every trait call is counted, and the next N calls of an operation can be
/// made to fail with `Transient` to exercise retry paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<Vec<MemBucket>>,

    list_objects_calls: AtomicUsize,
    list_buckets_calls: AtomicUsize,
    get_object_calls: AtomicUsize,

    failing_list_calls: AtomicUsize,
    failing_bucket_calls: AtomicUsize,
    failing_get_calls: AtomicUsize,
    next_list_error: Mutex<Option<StoreError>>,
    list_error_at: Mutex<Option<(usize, StoreError)>>,

    page_sizes: Mutex<Vec<u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, Vec<MemBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -------------------------------------------------------------------------
    // Population
    // -------------------------------------------------------------------------

    /// Add an empty bucket (no-op when it already exists).
    pub fn create_bucket(&self, name: &str) {
        let mut buckets = self.buckets();
        if !buckets.iter().any(|b| b.name == name) {
            buckets.push(MemBucket {
                name: name.to_string(),
                created: Utc::now(),
                objects: BTreeMap::new(),
            });
        }
    }

    /// Insert or replace an object, creating the bucket on demand.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) {
        self.create_bucket(bucket);
        let mut buckets = self.buckets();
        if let Some(b) = buckets.iter_mut().find(|b| b.name == bucket) {
            b.objects.insert(
                key.to_string(),
                MemObject {
                    data: data.into(),
                    last_modified,
                },
            );
        }
    }

    pub fn with_bucket(self, name: &str) -> Self {
        self.create_bucket(name);
        self
    }

    pub fn with_object(
        self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        self.put_object(bucket, key, data, last_modified);
        self
    }

    /// Object of `size` zero bytes; handy when only the size matters.
    pub fn with_sized_object(
        self,
        bucket: &str,
        key: &str,
        size: usize,
        last_modified: DateTime<Utc>,
    ) -> Self {
        self.with_object(bucket, key, vec![0u8; size], last_modified)
    }

    // -------------------------------------------------------------------------
    // Fault injection and call accounting
    // -------------------------------------------------------------------------

    /// The next `n` `list_objects` calls fail with `Transient`.
    pub fn fail_next_list_calls(&self, n: usize) {
        self.failing_list_calls.store(n, Ordering::SeqCst);
    }

    /// The next `n` `list_buckets` calls fail with `Transient`.
    pub fn fail_next_bucket_calls(&self, n: usize) {
        self.failing_bucket_calls.store(n, Ordering::SeqCst);
    }

    /// The next `n` `get_object` calls fail with `Transient`.
    pub fn fail_next_get_calls(&self, n: usize) {
        self.failing_get_calls.store(n, Ordering::SeqCst);
    }

    /// The next `list_objects` call fails with `err` (after any transient failures).
    pub fn fail_next_list_with(&self, err: StoreError) {
        *self
            .next_list_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(err);
    }

    /// The `call`-th `list_objects` call (1-based, counting every call) fails with `err`.
    pub fn fail_list_call_at(&self, call: usize, err: StoreError) {
        *self
            .list_error_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((call, err));
    }

    pub fn list_objects_calls(&self) -> usize {
        self.list_objects_calls.load(Ordering::SeqCst)
    }

    pub fn list_buckets_calls(&self) -> usize {
        self.list_buckets_calls.load(Ordering::SeqCst)
    }

    pub fn get_object_calls(&self) -> usize {
        self.get_object_calls.load(Ordering::SeqCst)
    }

    /// Page sizes requested by `list_objects`, in call order.
    pub fn requested_page_sizes(&self) -> Vec<u32> {
        self.page_sizes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&PaginationToken>,
        page_size: u32,
    ) -> Result<ListPage> {
        let call = self.list_objects_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.page_sizes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(page_size);

        if take_failure(&self.failing_list_calls) {
            return Err(StoreError::Transient(format!(
                "injected failure listing {}/{}",
                bucket, prefix
            )));
        }
        let injected = self
            .next_list_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(err) = injected {
            return Err(err);
        }
        {
            let mut scheduled = self
                .list_error_at
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if scheduled.as_ref().is_some_and(|(at, _)| *at == call) {
                if let Some((_, err)) = scheduled.take() {
                    return Err(err);
                }
            }
        }

        let buckets = self.buckets();
        let b = buckets
            .iter()
            .find(|b| b.name == bucket)
            .ok_or_else(|| StoreError::NotFound(format!("bucket '{}' does not exist", bucket)))?;

        let start_after = token.map(PaginationToken::as_str);
        let page_size = page_size.max(1) as usize;
        let mut entries: Vec<ObjectEntry> = Vec::new();
        let mut next_token = None;

        for (key, obj) in b.objects.range::<str, _>((
            std::ops::Bound::Included(prefix),
            std::ops::Bound::Unbounded,
        )) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if rest.is_empty() {
                continue;
            }

            let entry = match rest.find(PATH_DELIMITER) {
                Some(idx) => ObjectEntry::common_prefix(&key[..prefix.len() + idx + 1]),
                None => ObjectEntry::object(key.clone(), obj.data.len() as u64, obj.last_modified),
            };

            // Keys under one common prefix are contiguous, so comparing with
            // the previous entry is enough to fold them
            if entries.last().is_some_and(|last| last.key == entry.key) {
                continue;
            }
            if start_after.is_some_and(|after| entry.key.as_str() <= after) {
                continue;
            }
            if entries.len() == page_size {
                next_token = entries.last().map(|e| PaginationToken::new(e.key.clone()));
                break;
            }
            entries.push(entry);
        }

        Ok(ListPage { entries, next_token })
    }

    async fn list_buckets(&self) -> Result<Vec<BucketEntry>> {
        self.list_buckets_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_bucket_calls) {
            return Err(StoreError::Transient("injected failure listing buckets".into()));
        }
        Ok(self
            .buckets()
            .iter()
            .map(|b| BucketEntry::new(b.name.clone(), Some(b.created)))
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.get_object_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_get_calls) {
            return Err(StoreError::Transient(format!(
                "injected failure reading {}/{}",
                bucket, key
            )));
        }
        let buckets = self.buckets();
        let b = buckets
            .iter()
            .find(|b| b.name == bucket)
            .ok_or_else(|| StoreError::NotFound(format!("bucket '{}' does not exist", bucket)))?;
        b.objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::NotFound(format!("key '{}' not found in '{}'", key, bucket)))
    }
}

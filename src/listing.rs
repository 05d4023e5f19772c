// src/listing.rs
//! Listing engine.
//!
//! Turns a [`ListRequest`] into a lazy stream of [`ListItem`]s: pages are
//! fetched on demand, common prefixes are descended depth-first when the
//! request is recursive, each object passes through the compiled filter,
//! and the traversal stops the moment `max_files` entries have been emitted.
//!
//! A terminal backend failure ends the stream with one `Err` item; anything
//! emitted before it stays valid.

use async_stream::try_stream;
use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::filter::{Filter, FilterSpec};
use crate::object_store::{BucketEntry, ObjectEntry, ObjectStore, PaginationToken};
use crate::retry::with_retry;
use crate::uri_utils::StorageUri;

/// Boxed stream of listing results.
pub type ListStream = Pin<Box<dyn Stream<Item = Result<ListItem>> + Send>>;

/// What to list and how.
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub uri: StorageUri,
    pub recursive: bool,
    /// Upper bound on emitted entries; `None` is unbounded
    pub max_files: Option<u64>,
    pub filter: FilterSpec,
}

impl ListRequest {
    pub fn new(uri: StorageUri) -> Self {
        Self {
            uri,
            recursive: false,
            max_files: None,
            filter: FilterSpec::default(),
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_max_files(mut self, max_files: u64) -> Self {
        self.max_files = Some(max_files);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }
}

/// One emitted listing element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListItem {
    Object(ObjectEntry),
    Bucket(BucketEntry),
}

impl ListItem {
    pub fn as_object(&self) -> Option<&ObjectEntry> {
        match self {
            ListItem::Object(entry) => Some(entry),
            ListItem::Bucket(_) => None,
        }
    }

    pub fn as_bucket(&self) -> Option<&BucketEntry> {
        match self {
            ListItem::Bucket(bucket) => Some(bucket),
            ListItem::Object(_) => None,
        }
    }

    /// Object key or bucket name.
    pub fn name(&self) -> &str {
        match self {
            ListItem::Object(entry) => &entry.key,
            ListItem::Bucket(bucket) => &bucket.name,
        }
    }
}

/// One prefix being walked: its unconsumed page entries and where to resume.
#[derive(Debug)]
struct Frame {
    prefix: String,
    pending: VecDeque<ObjectEntry>,
    token: Option<PaginationToken>,
    fetched: bool,
}

impl Frame {
    fn new(prefix: String) -> Self {
        Self {
            prefix,
            pending: VecDeque::new(),
            token: None,
            fetched: false,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.fetched && self.token.is_none()
    }
}

/// Drives listings against one backend.
#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
}

impl Lister {
    pub fn new(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Start a traversal. Nothing touches the backend until the stream is polled.
    pub fn stream(&self, request: ListRequest, cancel: CancellationToken) -> ListStream {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();

        Box::pin(try_stream! {
            let filter = request.filter.compile(Utc::now())?;
            let filter_active = !filter.is_empty();
            let cap = request.max_files;
            let mut emitted: u64 = 0;

            info!(
                backend = store.name(),
                uri = %request.uri,
                recursive = request.recursive,
                max_files = ?cap,
                filter = %filter.description(),
                "listing started"
            );

            'walk: {
                if cap == Some(0) {
                    break 'walk;
                }

                // Scheme-only URI: enumerate buckets; filters do not apply
                if request.uri.is_bucket_enumeration() {
                    let buckets = with_retry(&config.retry, "list_buckets", &cancel, || {
                        store.list_buckets()
                    })
                    .await?;
                    for bucket in buckets {
                        yield ListItem::Bucket(bucket);
                        emitted += 1;
                        if cap.is_some_and(|c| emitted >= c) {
                            break 'walk;
                        }
                    }
                    break 'walk;
                }

                let bucket = request.uri.bucket.clone();
                let mut stack = vec![Frame::new(request.uri.list_prefix())];

                loop {
                    let Some(frame) = stack.last_mut() else {
                        break 'walk;
                    };

                    if let Some(entry) = frame.pending.pop_front() {
                        if entry.is_common_prefix() {
                            if request.recursive {
                                debug!(prefix = %entry.key, depth = stack.len(), "descending");
                                stack.push(Frame::new(entry.key));
                                continue;
                            }
                            // A filtered listing only reports objects
                            if filter_active {
                                continue;
                            }
                        } else if !filter.matches(&entry) {
                            continue;
                        }

                        yield ListItem::Object(entry);
                        emitted += 1;
                        if cap.is_some_and(|c| emitted >= c) {
                            break 'walk;
                        }
                        continue;
                    }

                    if frame.is_exhausted() {
                        stack.pop();
                        continue;
                    }

                    let prefix = frame.prefix.clone();
                    let token = frame.token.take();
                    frame.fetched = true;

                    // Without a filter every entry counts, so never ask for more than the cap allows
                    let page_size = match cap {
                        Some(c) if !filter_active => {
                            (c - emitted).min(u64::from(config.page_size)) as u32
                        }
                        _ => config.page_size,
                    };

                    debug!(
                        bucket = %bucket,
                        prefix = %prefix,
                        page_size,
                        resumed = token.is_some(),
                        "requesting page"
                    );
                    let page = with_retry(&config.retry, "list_objects", &cancel, || {
                        store.list_objects(&bucket, &prefix, token.as_ref(), page_size)
                    })
                    .await?;
                    debug!(
                        prefix = %prefix,
                        entries = page.entries.len(),
                        more = page.next_token.is_some(),
                        "page received"
                    );

                    if let Some(frame) = stack.last_mut() {
                        frame.pending = page.entries.into();
                        frame.token = page.next_token;
                    }
                }
            }

            info!(emitted, "listing finished");
        })
    }
}

// src/client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! URI-driven entry point: parse the URI, pick the backend for its scheme,
//! and run a listing, a bucket enumeration or a download against it.

use bytes::Bytes;
use futures::StreamExt;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{EngineConfig, S3Settings};
use crate::download::fetch_object;
use crate::error::{Result, StoreError};
use crate::file_store::FileStore;
use crate::filter::FilterSpec;
use crate::listing::{ListItem, ListRequest, ListStream, Lister};
use crate::object_store::{BucketEntry, ObjectStore, store_for_scheme};
use crate::retry::with_retry;
use crate::uri_utils::{Scheme, StorageUri, parse_uri};

/// Per-call listing options.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub recursive: bool,
    pub max_files: Option<u64>,
    pub filter: FilterSpec,
    /// Caller-side abort; a fresh token is used when absent
    pub cancel: Option<CancellationToken>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn max_files(mut self, max_files: u64) -> Self {
        self.max_files = Some(max_files);
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A collected listing that ended in a terminal error.
///
/// `partial` holds every entry emitted before the failure, in order.
#[derive(Debug, thiserror::Error)]
#[error("{error} ({} entries listed before the failure)", .partial.len())]
pub struct ListError {
    pub partial: Vec<ListItem>,
    #[source]
    pub error: StoreError,
}

impl ListError {
    pub fn into_parts(self) -> (Vec<ListItem>, StoreError) {
        (self.partial, self.error)
    }
}

impl From<StoreError> for ListError {
    fn from(error: StoreError) -> Self {
        Self {
            partial: Vec::new(),
            error,
        }
    }
}

/// Storage client over every supported scheme.
///
/// Backends are created on first use and shared by later calls.
pub struct StorageClient {
    config: EngineConfig,
    s3: S3Settings,
    file_root: Option<PathBuf>,
    /// Serves every scheme when set
    fixed_store: Option<Arc<dyn ObjectStore>>,
    s3_store: OnceCell<Arc<dyn ObjectStore>>,
    file_store: OnceCell<Arc<dyn ObjectStore>>,
}

impl StorageClient {
    pub fn new(config: EngineConfig, s3: S3Settings) -> Self {
        Self {
            config,
            s3,
            file_root: None,
            fixed_store: None,
            s3_store: OnceCell::new(),
            file_store: OnceCell::new(),
        }
    }

    /// Engine and S3 settings from the environment (and `.env`).
    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env(), S3Settings::from_env())
    }

    /// Route every URI to `store` regardless of its scheme.
    pub fn with_store(config: EngineConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            fixed_store: Some(store),
            ..Self::new(config, S3Settings::default())
        }
    }

    /// Resolve `file://` buckets below `root`.
    pub fn with_file_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.file_root = Some(root.into());
        self
    }

    fn store_for(&self, scheme: Scheme) -> Arc<dyn ObjectStore> {
        if let Some(store) = &self.fixed_store {
            return Arc::clone(store);
        }
        let cell = match scheme {
            Scheme::S3 => &self.s3_store,
            Scheme::File => &self.file_store,
        };
        let store = cell.get_or_init(|| match (scheme, &self.file_root) {
            (Scheme::File, Some(root)) => {
                Arc::new(FileStore::with_root(root.clone())) as Arc<dyn ObjectStore>
            }
            _ => store_for_scheme(scheme, &self.s3),
        });
        Arc::clone(store)
    }

    fn lister(&self, uri: &StorageUri) -> Lister {
        Lister::new(self.store_for(uri.scheme), self.config.clone())
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Lazy listing. A bad URI fails here; a bad filter arrives as the
    /// stream's first item.
    pub fn list_stream(&self, uri: &str, options: ListOptions) -> Result<ListStream> {
        let uri = parse_uri(uri)?;
        let lister = self.lister(&uri);

        let mut request = ListRequest::new(uri)
            .with_recursive(options.recursive)
            .with_filter(options.filter);
        request.max_files = options.max_files;

        Ok(lister.stream(request, options.cancel.unwrap_or_default()))
    }

    /// Listing collected into a vector. On a terminal failure the entries
    /// gathered so far travel with the error in [`ListError::partial`].
    pub async fn list(
        &self,
        uri: &str,
        options: ListOptions,
    ) -> std::result::Result<Vec<ListItem>, ListError> {
        let mut stream = self.list_stream(uri, options)?;
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(item) => items.push(item),
                Err(error) => {
                    return Err(ListError {
                        partial: items,
                        error,
                    });
                }
            }
        }
        Ok(items)
    }

    /// Buckets visible through a scheme-only URI such as `s3://`.
    pub async fn list_buckets(&self, uri: &str) -> Result<Vec<BucketEntry>> {
        let parsed = parse_uri(uri)?;
        if !parsed.is_bucket_enumeration() {
            return Err(StoreError::invalid_uri(
                uri,
                "bucket enumeration takes a scheme-only URI such as 's3://'",
            ));
        }

        let store = self.store_for(parsed.scheme);
        debug!(backend = store.name(), "listing buckets");
        let cancel = CancellationToken::new();
        with_retry(&self.config.retry, "list_buckets", &cancel, || store.list_buckets()).await
    }

    /// Whole object behind `uri`.
    pub async fn get_object(&self, uri: &str) -> Result<Bytes> {
        let parsed = parse_uri(uri)?;
        let store = self.store_for(parsed.scheme);
        fetch_object(store.as_ref(), &parsed, &self.config.retry, &CancellationToken::new()).await
    }
}

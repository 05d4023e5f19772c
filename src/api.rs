// src/api.rs
//! # bucketwalk public API
//!
//! The stable surface of the crate, re-exported at the root.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bucketwalk::api::{FilterSpec, ListOptions, StorageClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StorageClient::from_env();
//!
//! // Every parquet file over 1 MiB under a prefix, at most 100 of them
//! let options = ListOptions::new()
//!     .recursive(true)
//!     .max_files(100)
//!     .filter(FilterSpec::new().with_name("*.parquet").with_size(">1M"));
//! for item in client.list("s3://my-bucket/datasets/", options).await? {
//!     println!("{}", item.name());
//! }
//!
//! let bytes = client.get_object("s3://my-bucket/datasets/manifest.json").await?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

/// URI-driven client over every backend
pub use crate::client::{ListError, ListOptions, StorageClient};

/// Backend interface and the records it produces
pub use crate::object_store::{
    BucketEntry, EntryKind, ListPage, ObjectEntry, ObjectStore, PaginationToken, store_for_scheme,
};

/// Concrete backends
pub use crate::file_store::FileStore;
pub use crate::memory_store::MemoryStore;
pub use crate::s3_store::S3Store;

/// Listing engine
pub use crate::listing::{ListItem, ListRequest, ListStream, Lister};

/// Filters
pub use crate::filter::{Filter, FilterSpec, FilterValue, ObjectFilter};

/// Whole-object retrieval
pub use crate::download::fetch_object;

/// URI parsing
pub use crate::uri_utils::{Scheme, StorageUri, parse_uri};

/// Configuration
pub use crate::config::{EngineConfig, S3Settings, StoreCredentials};
pub use crate::retry::{RetryConfig, with_retry};

/// Errors
pub use crate::error::{Result, StoreError};

/// Cancellation handle accepted by listings
pub use tokio_util::sync::CancellationToken;

// src/object_store.rs
//
// Pluggable object-store abstraction with consistent URI schemes.
// Supported schemes: s3://, file:// (alias localfs://)
// Every backend answers the same three questions: what is under this prefix,
// which buckets exist, and what are the bytes of this key.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::S3Settings;
use crate::error::Result;
use crate::uri_utils::{Scheme, basename};

/// Whether a listing entry is data or a virtual directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Object,
    CommonPrefix,
}

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    /// Full key within the bucket; common prefixes end with `/`
    pub key: String,

    /// Size in bytes (0 for common prefixes)
    pub size: u64,

    /// Last modification time; always set for objects, `None` for common prefixes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    pub kind: EntryKind,
}

impl ObjectEntry {
    pub fn object(key: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: Some(last_modified),
            kind: EntryKind::Object,
        }
    }

    pub fn common_prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            last_modified: None,
            kind: EntryKind::CommonPrefix,
        }
    }

    pub fn is_common_prefix(&self) -> bool {
        self.kind == EntryKind::CommonPrefix
    }

    /// Last path component of the key.
    pub fn basename(&self) -> &str {
        basename(&self.key)
    }
}

/// A bucket (or container / top-level directory) known to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketEntry {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

impl BucketEntry {
    pub fn new(name: impl Into<String>, creation_time: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            creation_time,
        }
    }
}

/// Opaque continuation marker handed out by a backend.
///
/// Only the backend that produced a token knows what is inside it.
#[derive(Clone, PartialEq, Eq)]
pub struct PaginationToken(String);

impl PaginationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PaginationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // S3 tokens are long base64 blobs; a short head is enough for logs
        let head: String = self.0.chars().take(16).collect();
        write!(f, "PaginationToken({}…)", head)
    }
}

/// One page of a delimited listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_token: Option<PaginationToken>,
}

/// ObjectStore trait for pluggable storage backends.
///
/// Listings are always delimited by `/`: a page holds the objects directly
/// under `prefix` plus one `CommonPrefix` entry per immediate sub-level.
/// Recursion is the listing engine's job, not the backend's.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetch one page of entries under `prefix`, resuming after `token`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&PaginationToken>,
        page_size: u32,
    ) -> Result<ListPage>;

    /// Enumerate buckets in backend order.
    async fn list_buckets(&self) -> Result<Vec<BucketEntry>>;

    /// Get entire object into memory.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;
}

/// Convenience factory that picks a backend from a parsed scheme.
pub fn store_for_scheme(scheme: Scheme, s3: &S3Settings) -> Arc<dyn ObjectStore> {
    match scheme {
        Scheme::S3 => Arc::new(crate::s3_store::S3Store::new(s3.clone())),
        Scheme::File => Arc::new(crate::file_store::FileStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_constructors() {
        let now = Utc::now();
        let obj = ObjectEntry::object("a/b/c.txt", 42, now);
        assert_eq!(obj.kind, EntryKind::Object);
        assert_eq!(obj.basename(), "c.txt");
        assert_eq!(obj.last_modified, Some(now));

        let dir = ObjectEntry::common_prefix("a/b/");
        assert!(dir.is_common_prefix());
        assert_eq!(dir.size, 0);
        assert_eq!(dir.basename(), "b");
        assert!(dir.last_modified.is_none());
    }

    #[test]
    fn test_token_debug_is_truncated() {
        let token = PaginationToken::new("x".repeat(200));
        let rendered = format!("{:?}", token);
        assert!(rendered.len() < 40);
        assert_eq!(token.as_str().len(), 200);
    }

    #[test]
    fn test_entry_serializes_as_record() {
        let dir = ObjectEntry::common_prefix("logs/");
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["key"], "logs/");
        assert_eq!(json["kind"], "common_prefix");
        assert!(json.get("last_modified").is_none());
    }
}

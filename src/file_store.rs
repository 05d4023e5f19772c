// src/file_store.rs
//
// Local filesystem backend for file:// (and localfs://) URIs.
// A bucket is a directory; keys are `/`-separated paths below it.
// Directories surface as common prefixes, so listings look the same as on S3.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::PATH_DELIMITER;
use crate::error::{Result, StoreError};
use crate::object_store::{BucketEntry, EntryKind, ListPage, ObjectEntry, ObjectStore, PaginationToken};

#[derive(Debug, Clone, Default)]
pub struct FileStore {
    /// When set, buckets resolve below this directory instead of the process
    /// working directory (relative buckets) or `/` (absolute buckets).
    root: Option<PathBuf>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        reject_parent_components(bucket)?;
        Ok(match &self.root {
            Some(root) => root.join(bucket.trim_start_matches(PATH_DELIMITER)),
            None => PathBuf::from(bucket),
        })
    }

    /// Resolve the bucket directory, failing with `NotFound` when it is absent.
    async fn existing_bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.bucket_path(bucket)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::NotFound(format!(
                "bucket '{}' is not a directory",
                dir.display()
            ))),
            Err(e) => Err(io_error("stat bucket", &dir, e)),
        }
    }

    /// Entries of `dir` whose names start with `name_prefix` and whose keys sort
    /// after `start_after`, sorted by key.
    async fn scan_dir(
        &self,
        dir: &Path,
        dir_key: &str,
        name_prefix: &str,
        start_after: Option<&str>,
    ) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut rd = match fs::read_dir(dir).await {
            Ok(rd) => rd,
            // A prefix that names nothing lists empty, same as an object store
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Ok(entries);
            }
            Err(e) => return Err(io_error("read_dir", dir, e)),
        };

        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| io_error("read_dir", dir, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if !name.starts_with(name_prefix) {
                continue;
            }
            // "name/" is the larger of the two possible keys; at or below the
            // token either form was already returned, so skip the stat
            if start_after.is_some_and(|after| {
                format!("{}{}{}", dir_key, name, PATH_DELIMITER).as_str() <= after
            }) {
                continue;
            }

            // Follow symlinks; dangling ones are skipped
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if meta.is_dir() {
                entries.push(ObjectEntry::common_prefix(format!(
                    "{}{}{}",
                    dir_key, name, PATH_DELIMITER
                )));
            } else if meta.is_file() {
                entries.push(ObjectEntry {
                    key: format!("{}{}", dir_key, name),
                    size: meta.len(),
                    last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    kind: EntryKind::Object,
                });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&PaginationToken>,
        page_size: u32,
    ) -> Result<ListPage> {
        reject_parent_components(prefix)?;
        let bucket_dir = self.existing_bucket_dir(bucket).await?;

        // "logs/2024-0" → scan "logs/" for names starting with "2024-0"
        let (dir_key, name_prefix) = match prefix.rfind(PATH_DELIMITER) {
            Some(idx) => prefix.split_at(idx + 1),
            None => ("", prefix),
        };
        let scan = bucket_dir.join(dir_key);
        let start_after = token.map(PaginationToken::as_str);
        let mut entries = self.scan_dir(&scan, dir_key, name_prefix, start_after).await?;

        // Start-after pagination over the sorted keys
        if let Some(after) = start_after {
            let start = entries.partition_point(|e| e.key.as_str() <= after);
            entries.drain(..start);
        }

        let page_size = page_size.max(1) as usize;
        let next_token = if entries.len() > page_size {
            entries.truncate(page_size);
            entries.last().map(|e| PaginationToken::new(e.key.clone()))
        } else {
            None
        };

        debug!(
            dir = %scan.display(),
            entries = entries.len(),
            more = next_token.is_some(),
            "filesystem listing page"
        );
        Ok(ListPage { entries, next_token })
    }

    async fn list_buckets(&self) -> Result<Vec<BucketEntry>> {
        let base = self.root.clone().unwrap_or_else(|| PathBuf::from("/"));
        let mut rd = fs::read_dir(&base)
            .await
            .map_err(|e| io_error("read_dir", &base, e))?;

        let mut buckets = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| io_error("read_dir", &base, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(meta) = fs::metadata(entry.path()).await else {
                continue;
            };
            if !meta.is_dir() {
                continue;
            }
            let name = if self.root.is_some() {
                name
            } else {
                format!("{}{}", PATH_DELIMITER, name)
            };
            buckets.push(BucketEntry::new(
                name,
                meta.created().ok().map(DateTime::<Utc>::from),
            ));
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        reject_parent_components(key)?;
        let path = self.bucket_path(bucket)?.join(key);

        let meta = fs::metadata(&path)
            .await
            .map_err(|e| io_error("stat", &path, e))?;
        if meta.is_dir() {
            return Err(StoreError::NotFound(format!(
                "'{}' is a directory, not an object",
                path.display()
            )));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| io_error("read", &path, e))?;
        debug!(path = %path.display(), bytes = data.len(), "file read complete");
        Ok(Bytes::from(data))
    }
}

/// Keys and buckets never escape their directory.
fn reject_parent_components(path: &str) -> Result<()> {
    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(StoreError::invalid_uri(
            path,
            "'..' path components are not allowed",
        ));
    }
    Ok(())
}

/// Attach the operation and path to an IO error while keeping its classification.
fn io_error(op: &str, path: &Path, err: io::Error) -> StoreError {
    let context = format!("{} '{}': {}", op, path.display(), err);
    match StoreError::from(err) {
        StoreError::NotFound(_) => StoreError::NotFound(context),
        StoreError::AccessDenied(_) => StoreError::AccessDenied(context),
        StoreError::Malformed(_) => StoreError::Malformed(context),
        _ => StoreError::Transient(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let b = dir.path().join("bucket");
        std::fs::create_dir_all(b.join("logs/2024")).unwrap();
        std::fs::create_dir_all(b.join("logs/2025")).unwrap();
        std::fs::write(b.join("logs/readme.txt"), b"hello").unwrap();
        std::fs::write(b.join("logs/2024/a.log"), b"aaaa").unwrap();
        std::fs::write(b.join("top.bin"), vec![0u8; 16]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_delimited_listing() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());

        let page = store.list_objects("bucket", "logs/", None, 100).await.unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["logs/2024/", "logs/2025/", "logs/readme.txt"]);
        assert!(page.entries[0].is_common_prefix());
        assert_eq!(page.entries[2].size, 5);
        assert!(page.entries[2].last_modified.is_some());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_partial_name_prefix() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());
        let page = store.list_objects("bucket", "logs/20", None, 100).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(page.entries.iter().all(|e| e.is_common_prefix()));
    }

    #[tokio::test]
    async fn test_start_after_pagination() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());

        let first = store.list_objects("bucket", "logs/", None, 2).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        let token = first.next_token.expect("second page expected");

        let second = store.list_objects("bucket", "logs/", Some(&token), 2).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].key, "logs/readme.txt");
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_missing_bucket_and_prefix() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());

        let err = store.list_objects("nope", "", None, 10).await.unwrap_err();
        assert!(err.is_not_found());

        let page = store.list_objects("bucket", "missing/", None, 10).await.unwrap();
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn test_parent_components_rejected() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());
        let err = store.get_object("bucket", "../secret").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_uri");
        let err = store.list_objects("bucket", "logs/../../", None, 10).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_uri");
    }

    #[tokio::test]
    async fn test_get_object_bytes() {
        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());
        let data = store.get_object("bucket", "logs/2024/a.log").await.unwrap();
        assert_eq!(&data[..], b"aaaa");
        assert!(store.get_object("bucket", "logs/none.log").await.unwrap_err().is_not_found());
        assert!(store.get_object("bucket", "logs/2024").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_single_entry_pages_around_lookalike_names() {
        let dir = tempdir().unwrap();
        let b = dir.path().join("bucket");
        std::fs::create_dir_all(b.join("x")).unwrap();
        std::fs::write(b.join("x.txt"), b"1").unwrap();
        std::fs::write(b.join("x-y"), b"2").unwrap();
        std::fs::write(b.join("x0"), b"3").unwrap();

        let store = FileStore::with_root(dir.path());
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = store.list_objects("bucket", "", token.as_ref(), 1).await.unwrap();
            keys.extend(page.entries.into_iter().map(|e| e.key));
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(keys, vec!["x-y", "x.txt", "x/", "x0"]);
    }

    #[tokio::test]
    async fn test_key_through_a_file_is_not_found_without_retries() {
        use crate::retry::{RetryConfig, with_retry};
        use std::sync::atomic::{AtomicU32, Ordering};
        use tokio_util::sync::CancellationToken;

        let dir = fixture().await;
        let store = FileStore::with_root(dir.path());
        let calls = AtomicU32::new(0);
        let retry = RetryConfig::new().with_initial_backoff_ms(1).with_jitter(false);

        let err = with_retry(&retry, "get_object", &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            store.get_object("bucket", "logs/readme.txt/x")
        })
        .await
        .unwrap_err();
        assert!(err.is_not_found(), "got {:?}", err);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A bucket path running through a file is a missing bucket
        let err = store.list_objects("bucket/top.bin", "", None, 10).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_buckets_under_root() {
        let dir = fixture().await;
        std::fs::create_dir(dir.path().join("another")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let store = FileStore::with_root(dir.path());
        let names: Vec<_> = store
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["another", "bucket"]);
    }
}

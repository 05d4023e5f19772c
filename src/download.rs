// src/download.rs
//
// Whole-object retrieval: resolve the key from the URI, fetch it with retries,
// return the bytes buffered in memory.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::object_store::ObjectStore;
use crate::retry::{RetryConfig, with_retry};
use crate::uri_utils::StorageUri;

/// Fetch the object a URI points at.
///
/// The URI must name exactly one object: a bucket plus a key that does not
/// end with `/`. `NotFound` and `AccessDenied` surface unchanged; transient
/// failures are retried per `retry`.
pub async fn fetch_object(
    store: &dyn ObjectStore,
    uri: &StorageUri,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    let bucket = uri.requires_bucket()?;
    let key = uri.object_key()?;
    debug!(backend = store.name(), bucket, key, "fetching object");

    let data = with_retry(retry, "get_object", cancel, || store.get_object(bucket, key)).await?;

    info!(uri = %uri, bytes = data.len(), "object fetched");
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::uri_utils::parse_uri;
    use chrono::Utc;

    fn retry() -> RetryConfig {
        RetryConfig::new().with_initial_backoff_ms(1).with_jitter(false)
    }

    #[tokio::test]
    async fn test_fetch_exact_bytes() {
        let store = MemoryStore::new().with_object("b", "dir/k.txt", &b"payload"[..], Utc::now());
        let uri = parse_uri("s3://b/dir/k.txt").unwrap();
        let data = fetch_object(&store, &uri, &retry(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(&data[..], b"payload");
    }

    #[tokio::test]
    async fn test_directory_uri_is_rejected_locally() {
        let store = MemoryStore::new().with_bucket("b");
        let uri = parse_uri("s3://b/dir/").unwrap();
        let err = fetch_object(&store, &uri, &retry(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_uri");
        assert_eq!(store.get_object_calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_get_is_retried() {
        let store = MemoryStore::new().with_object("b", "k", &b"x"[..], Utc::now());
        store.fail_next_get_calls(2);
        let uri = parse_uri("s3://b/k").unwrap();
        let data = fetch_object(&store, &uri, &retry(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(&data[..], b"x");
        assert_eq!(store.get_object_calls(), 3);
    }
}

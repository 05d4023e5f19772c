// src/s3_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! `ObjectStore` implementation over the AWS SDK.
//!
//! Listing uses ListObjectsV2 with a `/` delimiter, so every page holds the
//! objects directly under the prefix plus one common prefix per sub-level.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::primitives::DateTime as AwsDateTime;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::S3Settings;
use crate::error::{Result, StoreError};
use crate::object_store::{BucketEntry, EntryKind, ListPage, ObjectEntry, ObjectStore, PaginationToken};
use crate::s3_client::LazyS3Client;

const DELIMITER: &str = "/";

pub struct S3Store {
    client: LazyS3Client,
}

impl S3Store {
    pub fn new(settings: S3Settings) -> Self {
        Self {
            client: LazyS3Client::new(settings),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&PaginationToken>,
        page_size: u32,
    ) -> Result<ListPage> {
        let client = self.client.get().await;
        let location = format!("s3://{}/{}", bucket, prefix);

        let mut req = client
            .list_objects_v2()
            .bucket(bucket)
            .delimiter(DELIMITER)
            .max_keys(page_size.min(i32::MAX as u32) as i32);
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }
        if let Some(token) = token {
            req = req.continuation_token(token.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| classify_sdk_error("ListObjectsV2", &location, e))?;

        let page = page_from_response(prefix, &resp)?;
        debug!(
            location = %location,
            entries = page.entries.len(),
            more = page.next_token.is_some(),
            "ListObjectsV2 page"
        );
        Ok(page)
    }

    async fn list_buckets(&self) -> Result<Vec<BucketEntry>> {
        let client = self.client.get().await;
        let mut buckets = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut req = client.list_buckets();
            if let Some(t) = &token {
                req = req.continuation_token(t);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| classify_sdk_error("ListBuckets", "s3://", e))?;

            for b in resp.buckets() {
                let name = b.name().ok_or_else(|| {
                    StoreError::Malformed("ListBuckets returned a bucket without a name".into())
                })?;
                buckets.push(BucketEntry::new(name, b.creation_date().and_then(to_chrono)));
            }

            token = resp
                .continuation_token()
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        Ok(buckets)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let client = self.client.get().await;
        let location = format!("s3://{}/{}", bucket, key);

        let resp = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error("GetObject", &location, e))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Transient(format!("GetObject {}: body read failed: {}", location, e)))?
            .into_bytes();

        debug!(location = %location, bytes = data.len(), "GetObject complete");
        Ok(data)
    }
}

// -----------------------------------------------------------------------------
// Response conversion
// -----------------------------------------------------------------------------

fn to_chrono(t: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

/// Merge contents and common prefixes into one key-ordered page.
fn page_from_response(prefix: &str, resp: &ListObjectsV2Output) -> Result<ListPage> {
    let mut entries = Vec::with_capacity(resp.contents().len() + resp.common_prefixes().len());

    for obj in resp.contents() {
        let key = obj.key().ok_or_else(|| {
            StoreError::Malformed(format!("ListObjectsV2 under '{}' returned an object without a key", prefix))
        })?;
        // Zero-byte "directory marker" for the prefix itself
        if key == prefix {
            continue;
        }
        entries.push(ObjectEntry {
            key: key.to_string(),
            size: obj.size().unwrap_or(0).max(0) as u64,
            last_modified: obj.last_modified().and_then(to_chrono),
            kind: EntryKind::Object,
        });
    }

    for cp in resp.common_prefixes() {
        let key = cp.prefix().ok_or_else(|| {
            StoreError::Malformed(format!(
                "ListObjectsV2 under '{}' returned a common prefix without a value",
                prefix
            ))
        })?;
        entries.push(ObjectEntry::common_prefix(key));
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));

    let truncated = resp.is_truncated().unwrap_or(false);
    let next_token = match resp.next_continuation_token().filter(|t| !t.is_empty()) {
        Some(t) if truncated => Some(PaginationToken::new(t)),
        Some(_) => None,
        None if truncated => {
            return Err(StoreError::Malformed(format!(
                "ListObjectsV2 under '{}' is truncated but has no continuation token",
                prefix
            )));
        }
        None => None,
    };

    Ok(ListPage { entries, next_token })
}

// -----------------------------------------------------------------------------
// Error classification
// -----------------------------------------------------------------------------

fn classify_sdk_error<E>(operation: &str, location: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = format!("{} {}: {}", operation, location, DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Transient(message)
        }
        SdkError::ServiceError(ctx) => {
            classify_service_error(err.code(), ctx.raw().status().as_u16(), message)
        }
        _ => StoreError::Malformed(message),
    }
}

/// Map a service error onto the taxonomy, error code first, then HTTP status.
fn classify_service_error(code: Option<&str>, status: u16, message: String) -> StoreError {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => return StoreError::NotFound(message),
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AllAccessDisabled") => {
            return StoreError::AccessDenied(message);
        }
        Some(
            "SlowDown" | "Throttling" | "ThrottlingException" | "RequestTimeout"
            | "InternalError" | "ServiceUnavailable" | "TooManyRequests",
        ) => return StoreError::Transient(message),
        _ => {}
    }

    match status {
        404 => StoreError::NotFound(message),
        401 | 403 => StoreError::AccessDenied(message),
        408 | 429 | 500..=599 => StoreError::Transient(message),
        _ => StoreError::Malformed(message),
    }
}

// src/uri_utils.rs
//! URI parsing for every supported backend.
//!
//! A storage URI has the shape `<scheme>://<bucket>[/<prefix>]`:
//!
//! - `s3://bucket/path/to/dir/` → bucket `bucket`, prefix `path/to/dir/`
//! - `s3://` → bucket enumeration (empty bucket)
//! - `file:///data/logs/2024` → bucket `/data`, prefix `logs/2024`
//! - `file://tmp/x` → bucket `tmp`, prefix `x` (relative to the store root)
//!
//! Parsing is pure; nothing here touches the network or the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::constants::PATH_DELIMITER;
use crate::error::{Result, StoreError};

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://").unwrap());

static S3_BUCKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9._-]+$").unwrap());

/// Supported storage service families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    S3,
    File,
}

impl Scheme {
    /// Scheme name without the `://` separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::S3 => "s3",
            Scheme::File => "file",
        }
    }

    fn from_name(name: &str) -> Option<Scheme> {
        match name.to_ascii_lowercase().as_str() {
            "s3" => Some(Scheme::S3),
            "file" | "localfs" => Some(Scheme::File),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageUri {
    pub scheme: Scheme,
    pub bucket: String,
    pub prefix: String,
}

impl StorageUri {
    /// True for scheme-only URIs such as `s3://`.
    pub fn is_bucket_enumeration(&self) -> bool {
        self.bucket.is_empty()
    }

    /// Fails with `InvalidUri` when the operation needs a bucket and there is none.
    pub fn requires_bucket(&self) -> Result<&str> {
        if self.bucket.is_empty() {
            return Err(StoreError::invalid_uri(
                self.to_string(),
                "a bucket is required for this operation",
            ));
        }
        Ok(&self.bucket)
    }

    /// Prefix as used for listing: a non-empty prefix is a directory and
    /// always ends with the delimiter.
    pub fn list_prefix(&self) -> String {
        normalize_dir_prefix(&self.prefix)
    }

    /// The object key for single-object operations.
    pub fn object_key(&self) -> Result<&str> {
        self.requires_bucket()?;
        if self.prefix.is_empty() || self.prefix.ends_with(PATH_DELIMITER) {
            return Err(StoreError::invalid_uri(
                self.to_string(),
                "URI has no object key; point it at a single object",
            ));
        }
        Ok(&self.prefix)
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.bucket)?;
        if !self.prefix.is_empty() {
            if !self.bucket.ends_with(PATH_DELIMITER) {
                write!(f, "{}", PATH_DELIMITER)?;
            }
            f.write_str(&self.prefix)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for StorageUri {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        parse_uri(s)
    }
}

/// Parse a storage URI into its scheme, bucket and prefix.
pub fn parse_uri(uri: &str) -> Result<StorageUri> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(StoreError::invalid_uri(uri, "empty URI"));
    }

    let caps = SCHEME_RE
        .captures(trimmed)
        .ok_or_else(|| StoreError::invalid_uri(uri, "missing '<scheme>://' prefix"))?;
    let scheme_name = &caps["scheme"];
    let scheme = Scheme::from_name(scheme_name).ok_or_else(|| {
        StoreError::invalid_uri(uri, format!("unsupported scheme '{}'", scheme_name))
    })?;

    let rest = &trimmed[caps[0].len()..];
    let (bucket, prefix) = match scheme {
        Scheme::S3 => split_s3(uri, rest)?,
        Scheme::File => split_file(rest),
    };

    Ok(StorageUri {
        scheme,
        bucket,
        prefix,
    })
}

fn split_s3(uri: &str, rest: &str) -> Result<(String, String)> {
    let (bucket, prefix) = rest.split_once(PATH_DELIMITER).unwrap_or((rest, ""));
    if bucket.is_empty() {
        if !prefix.is_empty() {
            return Err(StoreError::invalid_uri(uri, "missing bucket before the object path"));
        }
        return Ok((String::new(), String::new()));
    }
    if !S3_BUCKET_RE.is_match(bucket) {
        return Err(StoreError::invalid_uri(
            uri,
            format!("'{}' is not a valid bucket name", bucket),
        ));
    }
    Ok((bucket.to_string(), prefix.to_string()))
}

fn split_file(rest: &str) -> (String, String) {
    let absolute = rest.starts_with(PATH_DELIMITER);
    let path = rest.trim_start_matches(PATH_DELIMITER);
    if path.is_empty() {
        // `file://` enumerates, `file:///` is the filesystem root itself
        let bucket = if absolute { "/" } else { "" };
        return (bucket.to_string(), String::new());
    }
    let (first, prefix) = path.split_once(PATH_DELIMITER).unwrap_or((path, ""));
    let bucket = if absolute {
        format!("/{}", first)
    } else {
        first.to_string()
    };
    (bucket, prefix.to_string())
}

/// Append the delimiter to a non-empty prefix that lacks one.
pub fn normalize_dir_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(PATH_DELIMITER) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, PATH_DELIMITER)
    }
}

/// Last path component of a key, ignoring a trailing delimiter.
pub fn basename(key: &str) -> &str {
    let trimmed = key.trim_end_matches(PATH_DELIMITER);
    trimmed.rsplit(PATH_DELIMITER).next().unwrap_or(trimmed)
}

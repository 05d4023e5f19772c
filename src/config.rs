// src/config.rs
//
// Runtime parameters for the listing engine and the S3 connector.
// Everything is passed explicitly; `from_env` is only a convenience for callers.

use std::fmt;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_PAGE_SIZE,
    ENV_AWS_ENDPOINT_URL, ENV_AWS_REGION, ENV_OPERATION_TIMEOUT_SECS, ENV_PAGE_SIZE,
    MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
use crate::retry::RetryConfig;

/// Listing engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Keys requested per backend page (1..=1000)
    pub page_size: u32,

    /// Policy for transient backend failures
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style page size; out-of-range values are clamped.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Defaults overlaid with `BUCKETWALK_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let page_size = std::env::var(ENV_PAGE_SIZE)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map(clamp_page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self {
            page_size,
            retry: RetryConfig::from_env(),
        }
    }
}

fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

// -----------------------------------------------------------------------------
// S3 connector settings
// -----------------------------------------------------------------------------

/// Static access keys for S3-compatible services.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl StoreCredentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

/// How to reach an S3 (or S3-compatible) endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Region; falls back to the AWS provider chain, then `us-east-1`
    pub region: Option<String>,

    /// Custom endpoint for MinIO, Ceph and friends
    pub endpoint: Option<String>,

    /// Static credentials; `None` uses the AWS default provider chain
    pub credentials: Option<StoreCredentials>,

    /// Path-style addressing (`endpoint/bucket`), required by most S3-compatible services
    pub force_path_style: bool,

    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            credentials: None,
            force_path_style: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }
}

impl S3Settings {
    /// Settings from `AWS_REGION`, `AWS_ENDPOINT_URL` and
    /// `BUCKETWALK_OPERATION_TIMEOUT_SECS`. Credentials stay with the SDK chain.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let operation_timeout = std::env::var(ENV_OPERATION_TIMEOUT_SECS)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS));

        Self {
            region: non_empty(ENV_AWS_REGION),
            endpoint: non_empty(ENV_AWS_ENDPOINT_URL),
            operation_timeout,
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, credentials: StoreCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_force_path_style(mut self, enabled: bool) -> Self {
        self.force_path_style = enabled;
        self
    }
}

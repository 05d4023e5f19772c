// src/constants.rs
//
// Centralized constants for bucketwalk to avoid hardcoded values throughout the codebase

/// Default number of keys requested per listing page.
/// S3 caps ListObjectsV2 at 1000 keys, so this is also the ceiling.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Page size bounds for validation
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default number of attempts (first try included) for a backend call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Initial retry backoff (100 ms), doubled on every further attempt
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Upper bound for a single retry backoff (10 s)
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default region when neither settings nor environment provide one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Delimiter used for every listing; prefixes are virtual directories
pub const PATH_DELIMITER: char = '/';

// =============================================================================
// Environment variables
// =============================================================================

/// Overrides `EngineConfig::page_size`
pub const ENV_PAGE_SIZE: &str = "BUCKETWALK_PAGE_SIZE";

/// Overrides `RetryConfig::max_attempts`
pub const ENV_MAX_ATTEMPTS: &str = "BUCKETWALK_MAX_ATTEMPTS";

/// Overrides `RetryConfig::initial_backoff_ms`
pub const ENV_INITIAL_BACKOFF_MS: &str = "BUCKETWALK_INITIAL_BACKOFF_MS";

/// Overrides `RetryConfig::max_backoff_ms`
pub const ENV_MAX_BACKOFF_MS: &str = "BUCKETWALK_MAX_BACKOFF_MS";

/// Standard AWS variables honoured by `S3Settings::from_env`
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

/// Overrides `S3Settings::operation_timeout` (seconds)
pub const ENV_OPERATION_TIMEOUT_SECS: &str = "BUCKETWALK_OPERATION_TIMEOUT_SECS";

/// SDK connect timeout; listing calls are small, so fail fast
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// SDK per-operation timeout, generous enough for a buffered large GET
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 120;

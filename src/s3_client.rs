// src/s3_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Builds the AWS SDK client used by `S3Store`.
//! Region, endpoint and credentials all come from `S3Settings`; nothing here
//! reads the environment directly so two stores can talk to different endpoints.

use aws_config::meta::region::RegionProviderChain;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::S3Settings;
use crate::constants::DEFAULT_REGION;

/// Provider name reported by static credentials.
const CREDENTIALS_PROVIDER: &str = "bucketwalk-static";

// -----------------------------------------------------------------------------
// Lazy per-store client
// -----------------------------------------------------------------------------

/// S3 client that is built on first use and then shared.
#[derive(Debug)]
pub struct LazyS3Client {
    settings: S3Settings,
    client: OnceCell<Client>,
}

impl LazyS3Client {
    pub fn new(settings: S3Settings) -> Self {
        Self {
            settings,
            client: OnceCell::const_new(),
        }
    }

    /// Async getter; initializes once without blocking.
    pub async fn get(&self) -> &Client {
        self.client
            .get_or_init(|| async { build_s3_client(&self.settings).await })
            .await
    }
}

/// Load the shared AWS config and build a client from it.
pub async fn build_s3_client(settings: &S3Settings) -> Client {
    // Region: explicit setting, then the SDK chain, then the default
    let region = RegionProviderChain::first_try(settings.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(settings.connect_timeout)
        .operation_timeout(settings.operation_timeout)
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .timeout_config(timeout_config);

    if let Some(endpoint) = settings.endpoint.as_deref().filter(|e| !e.is_empty()) {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some(creds) = &settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            creds.access_key.clone(),
            creds.secret_key.clone(),
            creds.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER,
        ));
    }

    let cfg = loader.load().await;
    debug!(
        region = ?cfg.region(),
        endpoint = ?settings.endpoint,
        static_credentials = settings.credentials.is_some(),
        force_path_style = settings.force_path_style,
        "building S3 client"
    );

    // Path-style addressing (endpoint/bucket) is what S3-compatible services expect
    let s3_config = aws_sdk_s3::config::Builder::from(&cfg)
        .force_path_style(settings.force_path_style)
        .build();
    Client::from_conf(s3_config)
}

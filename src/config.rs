//! Component factory and environment-based configuration
//!
//! Library code never reads the environment; it takes an explicit
//! [`AggregatorConfig`]. Binaries call [`AggregatorConfig::from_env`] and
//! layer their command-line flags on top.

use crate::{
    AggregatorConfig, CloudProvider, Error, MalformedFragmentPolicy, PositionPolicy,
    ProbeFailurePolicy, Result, StorageConfig,
};

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create an object store for one storage configuration
    pub async fn create_object_store_for(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        match config.provider {
            CloudProvider::Memory => {
                info!(bucket = %config.bucket, "Using in-memory object store (development mode)");
                Ok(Arc::new(InMemory::new()))
            }
            CloudProvider::Local => {
                std::fs::create_dir_all(&config.bucket)?;
                info!(root = %config.bucket, "Using local filesystem object store");
                let store = LocalFileSystem::new_with_prefix(&config.bucket)
                    .map_err(|e| Error::Config(format!("invalid local store root: {}", e)))?;
                Ok(Arc::new(store))
            }
            CloudProvider::Aws => {
                if config.bucket.trim().is_empty() {
                    return Err(Error::Config("S3 bucket name is empty".to_string()));
                }

                info!(
                    bucket = %config.bucket,
                    region = %config.region,
                    requester_pays = config.requester_pays,
                    "Using S3 object store"
                );

                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .with_region(&config.region)
                    .with_request_payer(config.requester_pays);

                // Support custom endpoints (MinIO, LocalStack)
                if let Some(endpoint) = &config.endpoint {
                    info!("Using custom S3 endpoint: {}", endpoint);
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }

                let store = builder
                    .build()
                    .map_err(|e| Error::Config(format!("failed to build S3 store: {}", e)))?;
                Ok(Arc::new(store))
            }
        }
    }
}

impl AggregatorConfig {
    /// Build a configuration from environment variables
    ///
    /// Environment variables:
    /// - FRAGMENT_PROVIDER / ARTIFACT_PROVIDER: "aws" (default), "local" or "memory"
    /// - FRAGMENT_BUCKET / ARTIFACT_BUCKET: bucket names (root dirs for "local")
    /// - S3_REGION: S3 region (default: us-east-1)
    /// - S3_ENDPOINT: Custom S3 endpoint (optional, for MinIO)
    /// - REQUESTER_PAYS: send requester-pays headers to the fragment bucket (default: true)
    /// - ARTIFACT_REQUESTER_PAYS: same for the artifact bucket (default: false)
    /// - SCRATCH_DIR: root for request scratch space (default: system temp dir)
    /// - ARTIFACT_EXTENSION: published file extension (default: parquet)
    /// - REQUIRE_POSITION: fail empty light curves (default: true)
    /// - FETCH_CONCURRENCY: concurrent fragment downloads (default: 8)
    /// - SKIP_MALFORMED_FRAGMENTS: skip instead of abort (default: false)
    /// - FAIL_ON_INCONCLUSIVE_PROBE: fail instead of regenerate (default: false)
    pub fn from_env() -> Result<Self> {
        let defaults = AggregatorConfig::default();
        let region = env_string("S3_REGION").unwrap_or_else(|| "us-east-1".to_string());
        let endpoint = env_string("S3_ENDPOINT");

        let fragments = StorageConfig {
            provider: env_provider("FRAGMENT_PROVIDER")?.unwrap_or(defaults.fragments.provider),
            bucket: env_string("FRAGMENT_BUCKET").unwrap_or(defaults.fragments.bucket),
            region: region.clone(),
            endpoint: endpoint.clone(),
            requester_pays: parse_optional_bool("REQUESTER_PAYS")?
                .unwrap_or(defaults.fragments.requester_pays),
        };

        let artifacts = StorageConfig {
            provider: env_provider("ARTIFACT_PROVIDER")?.unwrap_or(defaults.artifacts.provider),
            bucket: env_string("ARTIFACT_BUCKET").unwrap_or(defaults.artifacts.bucket),
            region,
            endpoint,
            requester_pays: parse_optional_bool("ARTIFACT_REQUESTER_PAYS")?
                .unwrap_or(defaults.artifacts.requester_pays),
        };

        let mut artifact = defaults.artifact;
        if let Some(extension) = env_string("ARTIFACT_EXTENSION") {
            artifact.extension = extension;
        }
        if let Some(required) = parse_optional_bool("REQUIRE_POSITION")? {
            artifact.positions = if required {
                PositionPolicy::Required
            } else {
                PositionPolicy::Optional
            };
        }

        let fetch_concurrency = match env_string("FETCH_CONCURRENCY") {
            Some(raw) => parse_concurrency(&raw)?,
            None => defaults.fetch_concurrency,
        };

        let malformed_fragments = match parse_optional_bool("SKIP_MALFORMED_FRAGMENTS")? {
            Some(true) => MalformedFragmentPolicy::Skip,
            _ => MalformedFragmentPolicy::Abort,
        };
        let probe_failures = match parse_optional_bool("FAIL_ON_INCONCLUSIVE_PROBE")? {
            Some(true) => ProbeFailurePolicy::Fail,
            _ => ProbeFailurePolicy::Regenerate,
        };

        let config = Self {
            fragments,
            artifacts,
            scratch_root: env_string("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            artifact,
            fetch_concurrency,
            malformed_fragments,
            probe_failures,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            return Err(Error::Config(
                "fetch_concurrency must be at least 1".to_string(),
            ));
        }
        let extension = self.artifact.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains('/') {
            return Err(Error::Config(format!(
                "artifact extension '{}' is not a valid file extension",
                self.artifact.extension
            )));
        }
        if self.fragments.bucket.trim().is_empty() || self.artifacts.bucket.trim().is_empty() {
            return Err(Error::Config("bucket names cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_provider(name: &str) -> Result<Option<CloudProvider>> {
    env_string(name)
        .map(|raw| raw.parse::<CloudProvider>().map_err(Error::Config))
        .transpose()
}

fn parse_concurrency(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "FETCH_CONCURRENCY must be a positive integer, got '{}'",
            raw
        ))),
    }
}

pub(crate) fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}

fn parse_optional_bool(name: &str) -> Result<Option<bool>> {
    let Some(raw) = std::env::var(name).ok() else {
        return Ok(None);
    };
    parse_bool(name, &raw).map(Some)
}

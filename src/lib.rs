//! # lcstitch
//!
//! Stitches per-observation TESS full-frame-image measurements into one
//! light curve per target, sector, camera and CCD.
//!
//! Upstream cutout workers drop one small fragment per observation under a
//! key-derived prefix in object storage. lcstitch collects those fragments,
//! parses them, orders them by observation time, attaches header metadata
//! and publishes a single Parquet light-curve table.
//!
//! ## Key Properties
//!
//! - **Idempotent**: a request whose artifact already exists is a no-op when
//!   the caller opts into caching
//! - **Deterministic**: the same fragments always produce byte-identical
//!   output, whatever order the store lists them in
//! - **Leak-free**: request scratch space is released on every exit path
//!
//! ## Architecture
//!
//! - **Fragment Source**: lists and downloads fragments under the key prefix
//! - **Fragment Parser**: turns fragment bytes into measurement records
//! - **Aggregator**: accumulates, sorts and derives the aperture position
//! - **Artifact Builder**: header + table to Parquet bytes
//! - **Publisher**: existence probe and single-attempt upload

pub mod aggregate;
pub mod artifact;
pub mod clock;
pub mod config;
pub mod fragment;
pub mod pipeline;
pub mod publish;
pub mod request;
pub mod schema;
pub mod telemetry;
pub mod worker;

mod error;

pub use error::{BoxError, Error, ErrorKind, Result};

use std::path::PathBuf;

/// Configuration for one aggregation pipeline
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Store holding the per-observation fragments
    pub fragments: StorageConfig,
    /// Store receiving the published light curves
    pub artifacts: StorageConfig,
    /// Directory under which each request creates its scratch space
    pub scratch_root: PathBuf,
    /// Output header and format settings
    pub artifact: ArtifactConfig,
    /// Number of fragments fetched concurrently
    pub fetch_concurrency: usize,
    /// What to do when one fragment fails to parse
    pub malformed_fragments: MalformedFragmentPolicy,
    /// What to do when the cache probe cannot tell whether the artifact exists
    pub probe_failures: ProbeFailurePolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            fragments: StorageConfig {
                bucket: "lcstitch-fragments".to_string(),
                requester_pays: true,
                ..Default::default()
            },
            artifacts: StorageConfig::default(),
            scratch_root: std::env::temp_dir(),
            artifact: ArtifactConfig::default(),
            fetch_concurrency: 8,
            malformed_fragments: MalformedFragmentPolicy::Abort,
            probe_failures: ProbeFailurePolicy::Regenerate,
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend serving the bucket.
    pub provider: CloudProvider,
    /// Bucket name, or root directory for the local provider.
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack)
    pub endpoint: Option<String>,
    /// Send requests with the requester-pays flag set
    pub requester_pays: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: CloudProvider::Aws,
            bucket: "lcstitch-lightcurves".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            requester_pays: false,
        }
    }
}

/// Supported object storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Memory,
    Local,
    Aws,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Local => "local",
            Self::Aws => "aws",
        }
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "local" | "file" => Ok(Self::Local),
            "aws" | "s3" => Ok(Self::Aws),
            other => Err(format!(
                "unknown cloud provider '{}'; expected one of memory, local, aws",
                other
            )),
        }
    }
}

/// Output artifact settings
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    /// `TELESCOP` header value
    pub telescope: String,
    /// `RADESYS` header value
    pub coordinate_system: String,
    /// File extension of the published artifact
    pub extension: String,
    /// Whether the derived aperture position must be present
    pub positions: PositionPolicy,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            telescope: "TESS".to_string(),
            coordinate_system: "ICRS".to_string(),
            extension: "parquet".to_string(),
            positions: PositionPolicy::Required,
        }
    }
}

/// Header requirement for the aperture position derived from the records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPolicy {
    /// An artifact without observed positions is a serialization failure
    Required,
    /// Position header keys are omitted when nothing was observed
    Optional,
}

/// Handling of fragments that fail to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedFragmentPolicy {
    /// Fail the whole request on the first malformed fragment
    Abort,
    /// Log the fragment and keep aggregating the rest
    Skip,
}

/// Handling of an existence probe that neither found nor ruled out the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailurePolicy {
    /// Treat as a cache miss and rebuild
    Regenerate,
    /// Fail the request with a fetch failure
    Fail,
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::aggregate::{Aggregator, FinalizedTable};
    pub use crate::artifact::{Artifact, ArtifactBuilder, ArtifactMetadata};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::fragment::{FragmentHandle, FragmentSource};
    pub use crate::pipeline::{AggregationOutcome, AggregationPipeline};
    pub use crate::publish::{ExistenceProbe, PublishState, Publisher};
    pub use crate::request::{AggregationKey, AggregationRequest};
    pub use crate::schema::{AperturePosition, MeasurementRecord, MeasurementTable};
    pub use crate::{
        AggregatorConfig, ArtifactConfig, CloudProvider, Error, ErrorKind,
        MalformedFragmentPolicy, PositionPolicy, ProbeFailurePolicy, Result, StorageConfig,
    };
}

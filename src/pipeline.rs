//! End-to-end aggregation of one request
//!
//! ```text
//! request ─► probe (use_cache) ─► list ─► fetch+parse ─► aggregate ─► build ─► stage ─► publish
//!               │ found
//!               └──────────────► Cached
//! ```
//!
//! The pipeline holds no state between requests. Every run starts from an
//! empty aggregator and a fresh scratch directory, so a redelivered request
//! simply runs again.

use crate::aggregate::{Aggregator, FinalizedTable};
use crate::artifact::ArtifactBuilder;
use crate::clock::{Clock, SystemClock};
use crate::config::ComponentFactory;
use crate::fragment::{parse_fragment, FragmentHandle, FragmentSource, ScratchSpace};
use crate::publish::{ExistenceProbe, Publisher};
use crate::request::{AggregationKey, AggregationRequest};
use crate::schema::MeasurementRecord;
use crate::telemetry;
use crate::{AggregatorConfig, Error, MalformedFragmentPolicy, ProbeFailurePolicy, Result};

use futures::stream::StreamExt;
use metrics::{counter, histogram};
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Successful end state of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// A prior run already published the artifact
    Cached { address: Path },
    /// This run published the artifact
    Published {
        address: Path,
        rows: usize,
        bytes: usize,
        skipped_fragments: usize,
    },
}

impl AggregationOutcome {
    pub fn address(&self) -> &Path {
        match self {
            AggregationOutcome::Cached { address } => address,
            AggregationOutcome::Published { address, .. } => address,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AggregationOutcome::Cached { .. } => "cached",
            AggregationOutcome::Published { .. } => "published",
        }
    }
}

/// Records collected for one key
struct Collected {
    finalized: FinalizedTable,
    skipped: usize,
}

/// Aggregates fragments into published light curves
pub struct AggregationPipeline {
    config: AggregatorConfig,
    source: FragmentSource,
    artifact_store: Arc<dyn ObjectStore>,
    builder: ArtifactBuilder,
    clock: Arc<dyn Clock>,
}

impl AggregationPipeline {
    /// Create a pipeline over explicit stores, stamping artifacts with the
    /// system clock
    pub fn new(
        config: AggregatorConfig,
        fragment_store: Arc<dyn ObjectStore>,
        artifact_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self::with_clock(
            config,
            fragment_store,
            artifact_store,
            Arc::new(SystemClock::new()),
        )
    }

    /// Create a pipeline with a custom clock
    pub fn with_clock(
        config: AggregatorConfig,
        fragment_store: Arc<dyn ObjectStore>,
        artifact_store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let builder = ArtifactBuilder::new(config.artifact.clone());
        Self {
            config,
            source: FragmentSource::new(fragment_store),
            artifact_store,
            builder,
            clock,
        }
    }

    /// Create a pipeline whose stores are built from `config`
    pub async fn from_config(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        let fragment_store = ComponentFactory::create_object_store_for(&config.fragments).await?;
        let artifact_store = ComponentFactory::create_object_store_for(&config.artifacts).await?;
        Ok(Self::new(config, fragment_store, artifact_store))
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Target address for `key`
    pub fn artifact_address(&self, key: &AggregationKey) -> Path {
        self.builder.address_for(key)
    }

    /// Run one request to a terminal state
    #[instrument(skip_all, fields(key = %request.key, use_cache = request.use_cache))]
    pub async fn run(&self, request: &AggregationRequest) -> Result<AggregationOutcome> {
        let start = Instant::now();
        let mut publisher = Publisher::new(
            Arc::clone(&self.artifact_store),
            self.artifact_address(&request.key),
        );

        let result = self.execute(request, &mut publisher).await;
        let elapsed = start.elapsed().as_secs_f64();
        let service = telemetry::service().unwrap_or("lcstitch");

        match &result {
            Ok(outcome) => {
                counter!(
                    "lcstitch_requests_total",
                    "service" => service,
                    "outcome" => outcome.label()
                )
                .increment(1);
                histogram!(
                    "lcstitch_request_duration_seconds",
                    "service" => service,
                    "outcome" => outcome.label()
                )
                .record(elapsed);
                debug!(state = %publisher.state(), "Request complete");
            }
            Err(e) => {
                publisher.mark_failed();
                counter!(
                    "lcstitch_requests_total",
                    "service" => service,
                    "outcome" => e.kind().as_str()
                )
                .increment(1);
                histogram!(
                    "lcstitch_request_duration_seconds",
                    "service" => service,
                    "outcome" => "failed"
                )
                .record(elapsed);
                error!(
                    address = %publisher.address(),
                    kind = e.kind().as_str(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Aggregation failed"
                );
            }
        }

        result
    }

    async fn execute(
        &self,
        request: &AggregationRequest,
        publisher: &mut Publisher,
    ) -> Result<AggregationOutcome> {
        if request.use_cache && self.artifact_exists(publisher).await? {
            publisher.mark_cached()?;
            return Ok(AggregationOutcome::Cached {
                address: publisher.address().clone(),
            });
        }

        let scratch = ScratchSpace::create_in(&self.config.scratch_root)?;

        let collected = self.collect(&request.key, &scratch).await?;
        let artifact = self
            .builder
            .build(&request.key, collected.finalized, self.clock.now())?;
        info!(
            rows = artifact.table.len(),
            bytes = artifact.bytes.len(),
            skipped_fragments = collected.skipped,
            "Built light curve"
        );
        histogram!("lcstitch_artifact_bytes").record(artifact.bytes.len() as f64);

        let staged = scratch
            .stage_bytes(artifact.file_name(), &artifact.bytes)
            .await?;
        let receipt = publisher.publish(staged).await?;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch space");
        }

        Ok(AggregationOutcome::Published {
            address: receipt.address,
            rows: artifact.table.len(),
            bytes: receipt.size,
            skipped_fragments: collected.skipped,
        })
    }

    /// Cache probe with the configured policy for inconclusive answers
    async fn artifact_exists(&self, publisher: &Publisher) -> Result<bool> {
        match publisher.probe().await {
            ExistenceProbe::Found => Ok(true),
            ExistenceProbe::NotFound => Ok(false),
            ExistenceProbe::Inconclusive(e) => match self.config.probe_failures {
                ProbeFailurePolicy::Regenerate => {
                    warn!(
                        address = %publisher.address(),
                        error = %e,
                        "Existence probe inconclusive, regenerating"
                    );
                    Ok(false)
                }
                ProbeFailurePolicy::Fail => Err(Error::fetch(publisher.address().to_string(), e)),
            },
        }
    }

    /// Fetch, parse and aggregate every fragment of `key`
    async fn collect(&self, key: &AggregationKey, scratch: &ScratchSpace) -> Result<Collected> {
        let source = &self.source;
        let mut aggregator = Aggregator::new();
        let mut skipped = 0usize;

        // `buffered` yields in enumeration order, so records are appended
        // in the same order a sequential loop would append them
        let mut loads = source
            .list(key)
            .enumerate()
            .map(move |(sequence, handle)| async move {
                let handle = handle?;
                load_record(source, &handle, scratch, sequence).await
            })
            .buffered(self.config.fetch_concurrency.max(1));

        while let Some(result) = loads.next().await {
            match result {
                Ok(record) => {
                    counter!("lcstitch_fragments_total", "result" => "parsed").increment(1);
                    aggregator.add(record);
                }
                Err(e @ Error::MalformedFragment { .. })
                    if self.config.malformed_fragments == MalformedFragmentPolicy::Skip =>
                {
                    counter!("lcstitch_fragments_total", "result" => "skipped").increment(1);
                    warn!(error = %e, "Skipping malformed fragment");
                    skipped += 1;
                }
                Err(e) => {
                    counter!("lcstitch_fragments_total", "result" => e.kind().as_str())
                        .increment(1);
                    return Err(e);
                }
            }
        }

        if aggregator.is_empty() {
            info!(prefix = %key.fragment_prefix(), "No fragments found");
        } else {
            debug!(records = aggregator.len(), "Collected fragments");
        }

        Ok(Collected {
            finalized: aggregator.finalize(),
            skipped,
        })
    }
}

/// Download one fragment, parse it, and drop the local copy
async fn load_record(
    source: &FragmentSource,
    handle: &FragmentHandle,
    scratch: &ScratchSpace,
    sequence: usize,
) -> Result<MeasurementRecord> {
    let staged = source.fetch(handle, scratch, sequence).await?;
    let bytes = staged
        .read()
        .await
        .map_err(|e| Error::fetch(handle.to_string(), e))?;

    let parsed = parse_fragment(handle, &bytes);
    if let Err(e) = staged.discard().await {
        warn!(fragment = %handle, error = %e, "Failed to remove staged fragment");
    }
    parsed
}

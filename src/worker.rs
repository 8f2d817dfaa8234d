//! Channel-driven request loop
//!
//! The orchestrator side pushes raw JSON requests into an mpsc channel and
//! reads one [`Completion`] back per request, in arrival order. Requests are
//! processed one at a time; scale out by running more workers.

use crate::pipeline::{AggregationOutcome, AggregationPipeline};
use crate::request::AggregationRequest;
use crate::Error;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal report for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Arrival position of the request, starting at 0
    pub sequence: u64,
    /// Canonical key, absent when the request could not be decoded
    pub key: Option<String>,
    #[serde(flatten)]
    pub status: CompletionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionStatus {
    Cached {
        address: String,
    },
    Published {
        address: String,
        rows: usize,
        bytes: usize,
        skipped_fragments: usize,
    },
    Failed {
        kind: String,
        message: String,
        retryable: bool,
    },
}

impl CompletionStatus {
    fn from_error(error: &Error) -> Self {
        CompletionStatus::Failed {
            kind: error.kind().as_str().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl From<AggregationOutcome> for CompletionStatus {
    fn from(outcome: AggregationOutcome) -> Self {
        match outcome {
            AggregationOutcome::Cached { address } => CompletionStatus::Cached {
                address: address.to_string(),
            },
            AggregationOutcome::Published {
                address,
                rows,
                bytes,
                skipped_fragments,
            } => CompletionStatus::Published {
                address: address.to_string(),
                rows,
                bytes,
                skipped_fragments,
            },
        }
    }
}

impl Completion {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CompletionStatus::Failed { .. })
    }
}

/// Runs pipeline requests pulled from a channel
pub struct Worker {
    pipeline: Arc<AggregationPipeline>,
    shutdown: CancellationToken,
    cache_override: Option<bool>,
}

impl Worker {
    pub fn new(pipeline: Arc<AggregationPipeline>) -> Self {
        Self {
            pipeline,
            shutdown: CancellationToken::new(),
            cache_override: None,
        }
    }

    /// Force `use_cache` on every request, whatever the request says
    pub fn with_cache_override(mut self, use_cache: Option<bool>) -> Self {
        self.cache_override = use_cache;
        self
    }

    /// Get a cancellation token that can be used to trigger graceful shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Decode and run one request
    pub async fn handle(&self, sequence: u64, raw: String) -> Completion {
        let mut request = match AggregationRequest::from_json(raw.as_bytes()) {
            Ok(request) => request,
            Err(e) => {
                warn!(sequence, error = %e, "Rejected undecodable request");
                return Completion {
                    sequence,
                    key: None,
                    status: CompletionStatus::from_error(&e),
                };
            }
        };
        if let Some(use_cache) = self.cache_override {
            request.use_cache = use_cache;
        }

        let key = request.key.to_string();
        let status = match self.pipeline.run(&request).await {
            Ok(outcome) => outcome.into(),
            Err(e) => CompletionStatus::from_error(&e),
        };

        Completion {
            sequence,
            key: Some(key),
            status,
        }
    }

    /// Process requests until the channel closes or shutdown is requested
    ///
    /// A request already running when shutdown is requested finishes first.
    /// Returns the number of completions sent.
    pub async fn run(
        &self,
        mut requests: mpsc::Receiver<String>,
        completions: mpsc::Sender<Completion>,
    ) -> u64 {
        let mut sequence = 0u64;

        loop {
            let raw = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(processed = sequence, "Worker shutting down");
                    break;
                }
                next = requests.recv() => match next {
                    Some(raw) => raw,
                    None => {
                        debug!(processed = sequence, "Request channel closed");
                        break;
                    }
                },
            };

            let completion = self.handle(sequence, raw).await;
            sequence += 1;

            if completions.send(completion).await.is_err() {
                warn!("Completion receiver dropped, stopping worker");
                break;
            }
        }

        sequence
    }
}

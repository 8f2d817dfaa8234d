//! Artifact publication
//!
//! One [`Publisher`] exists per request and walks a small state machine:
//!
//! ```text
//! Unchecked ──► Cached      artifact already present, nothing written
//!     │
//!     ├───────► Published   artifact written by this request
//!     │
//!     └───────► Failed      any step errored, nothing written
//! ```
//!
//! All three end states are terminal. The upload is a single `put`; retries
//! belong to whoever redelivers the request.

use crate::fragment::StagedFile;
use crate::{Error, Result};

use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of probing the durable store for an artifact
#[derive(Debug)]
pub enum ExistenceProbe {
    Found,
    NotFound,
    /// The store answered with something other than found / not found
    Inconclusive(object_store::Error),
}

/// Publication state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Unchecked,
    Cached,
    Published,
    Failed,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Unchecked => "unchecked",
            PublishState::Cached => "cached",
            PublishState::Published => "published",
            PublishState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PublishState::Unchecked)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub address: Path,
    pub size: usize,
    pub e_tag: Option<String>,
}

/// Writes one artifact address in the durable store
#[derive(Debug)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    address: Path,
    state: PublishState,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, address: Path) -> Self {
        Self {
            store,
            address,
            state: PublishState::Unchecked,
        }
    }

    pub fn address(&self) -> &Path {
        &self.address
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Read-only existence probe
    pub async fn probe(&self) -> ExistenceProbe {
        match self.store.head(&self.address).await {
            Ok(_) => ExistenceProbe::Found,
            Err(object_store::Error::NotFound { .. }) => ExistenceProbe::NotFound,
            Err(e) => ExistenceProbe::Inconclusive(e),
        }
    }

    /// Whether the artifact exists; inconclusive probes are fetch failures
    pub async fn check_existing(&self) -> Result<bool> {
        match self.probe().await {
            ExistenceProbe::Found => Ok(true),
            ExistenceProbe::NotFound => Ok(false),
            ExistenceProbe::Inconclusive(e) => Err(Error::fetch(self.address.to_string(), e)),
        }
    }

    /// Record that a prior run's artifact satisfies this request
    pub fn mark_cached(&mut self) -> Result<()> {
        self.transition(PublishState::Cached)?;
        info!(address = %self.address, "Artifact exists, skipping");
        Ok(())
    }

    /// Record that this request failed without publishing
    ///
    /// No-op when the publisher already failed, so error paths can call it
    /// unconditionally.
    pub fn mark_failed(&mut self) {
        if self.state == PublishState::Unchecked {
            self.state = PublishState::Failed;
        }
    }

    /// Upload the staged artifact with a single put
    ///
    /// The staged file is deleted whatever the outcome.
    pub async fn publish(&mut self, staged: StagedFile) -> Result<PublishReceipt> {
        if self.state != PublishState::Unchecked {
            return Err(self.invalid_transition(PublishState::Published));
        }

        let result = self.upload(&staged).await;
        if let Err(e) = staged.discard().await {
            warn!(address = %self.address, error = %e, "Failed to remove staged artifact");
        }

        match result {
            Ok(receipt) => {
                self.state = PublishState::Published;
                info!(address = %receipt.address, bytes = receipt.size, "Published artifact");
                Ok(receipt)
            }
            Err(e) => {
                self.state = PublishState::Failed;
                Err(e)
            }
        }
    }

    async fn upload(&self, staged: &StagedFile) -> Result<PublishReceipt> {
        let bytes = staged
            .read()
            .await
            .map_err(|e| Error::publish(self.address.to_string(), e))?;
        let size = bytes.len();
        debug!(address = %self.address, bytes = size, "Uploading artifact");

        let result = self
            .store
            .put(&self.address, PutPayload::from(bytes))
            .await
            .map_err(|e| Error::publish(self.address.to_string(), e))?;

        Ok(PublishReceipt {
            address: self.address.clone(),
            size,
            e_tag: result.e_tag,
        })
    }

    fn transition(&mut self, to: PublishState) -> Result<()> {
        if self.state != PublishState::Unchecked {
            return Err(self.invalid_transition(to));
        }
        self.state = to;
        Ok(())
    }

    fn invalid_transition(&self, to: PublishState) -> Error {
        Error::Internal(format!(
            "publisher for {} cannot move from {} to {}",
            self.address, self.state, to
        ))
    }
}

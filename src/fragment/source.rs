//! Fragment enumeration and download

use super::{FragmentHandle, ScratchSpace, StagedFile};
use crate::request::AggregationKey;
use crate::{Error, Result};

use futures::stream::{BoxStream, StreamExt};
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Read-only view of the fragment store
#[derive(Debug, Clone)]
pub struct FragmentSource {
    store: Arc<dyn ObjectStore>,
}

impl FragmentSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Lazily enumerate the fragments of `key`
    ///
    /// Listing order is whatever the store returns and carries no meaning.
    /// An empty stream means no observations were found.
    pub fn list(&self, key: &AggregationKey) -> BoxStream<'_, Result<FragmentHandle>> {
        let prefix = key.fragment_prefix();
        let location = prefix.to_string();
        debug!(prefix = %location, "Listing fragments");

        self.store
            .list(Some(&prefix))
            .map(move |meta| {
                meta.map(FragmentHandle::from)
                    .map_err(|e| Error::fetch(location.clone(), e))
            })
            .boxed()
    }

    /// Stream one fragment body into scratch space
    ///
    /// `sequence` keeps staged names unique within the request.
    pub async fn fetch(
        &self,
        handle: &FragmentHandle,
        scratch: &ScratchSpace,
        sequence: usize,
    ) -> Result<StagedFile> {
        let location = handle.to_string();
        let result = self
            .store
            .get(&handle.location)
            .await
            .map_err(|e| Error::fetch(location.clone(), e))?;

        let staged = StagedFile::new(
            scratch.stage_path(&format!("{:06}-{}", sequence, handle.file_name())),
        );
        let mut file = tokio::fs::File::create(staged.path())
            .await
            .map_err(|e| Error::fetch(location.clone(), e))?;

        let mut body = result.into_stream();
        let mut written = 0usize;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::fetch(location.clone(), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::fetch(location.clone(), e))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| Error::fetch(location.clone(), e))?;

        debug!(fragment = %location, bytes = written, "Fetched fragment");
        Ok(staged)
    }
}

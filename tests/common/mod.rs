//! Shared fixtures for integration tests

#![allow(dead_code)]

use lcstitch::clock::FixedClock;
use lcstitch::pipeline::AggregationPipeline;
use lcstitch::request::{AggregationKey, AggregationRequest};
use lcstitch::AggregatorConfig;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures::stream::{BoxStream, StreamExt};
use object_store::memory::InMemory;
use object_store::{
    path::Path, GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOpts, PutOptions, PutPayload, PutResult, Result as ObjectStoreResult,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// ObjectStore wrapper that counts calls and injects failures
///
/// Every switch defaults to off, so an untouched wrapper behaves exactly
/// like the inner store.
pub struct FaultyStore {
    inner: Arc<dyn ObjectStore>,
    pub fail_head: AtomicBool,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_list: AtomicBool,
    /// Yield listings in reverse path order
    pub reverse_listing: AtomicBool,
    pub heads: AtomicUsize,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub lists: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            fail_head: AtomicBool::new(false),
            fail_get: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            reverse_listing: AtomicBool::new(false),
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    fn injected(op: &str) -> object_store::Error {
        object_store::Error::Generic {
            store: "FaultyStore",
            source: format!("injected {} failure", op).into(),
        }
    }
}

impl fmt::Display for FaultyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultyStore({})", self.inner)
    }
}

impl fmt::Debug for FaultyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultyStore")
            .field("inner", &self.inner.to_string())
            .finish()
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put_opts(
        &self,
        location: &Path,
        bytes: PutPayload,
        opts: PutOptions,
    ) -> ObjectStoreResult<PutResult> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.inner.put_opts(location, bytes, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> ObjectStoreResult<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> ObjectStoreResult<GetResult> {
        if options.head {
            self.heads.fetch_add(1, Ordering::SeqCst);
            if self.fail_head.load(Ordering::SeqCst) {
                return Err(Self::injected("head"));
            }
        } else {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(Self::injected("get"));
            }
        }
        self.inner.get_opts(location, options).await
    }

    async fn head(&self, location: &Path) -> ObjectStoreResult<ObjectMeta> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(Self::injected("head"));
        }
        self.inner.head(location).await
    }

    async fn delete(&self, location: &Path) -> ObjectStoreResult<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, ObjectStoreResult<ObjectMeta>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return futures::stream::once(async { Err(Self::injected("list")) }).boxed();
        }
        if !self.reverse_listing.load(Ordering::SeqCst) {
            return self.inner.list(prefix);
        }

        let inner = Arc::clone(&self.inner);
        let prefix = prefix.cloned();
        futures::stream::once(async move {
            inner
                .list(prefix.as_ref())
                .collect::<Vec<ObjectStoreResult<ObjectMeta>>>()
                .await
        })
        .flat_map(|mut entries| {
            entries.reverse();
            futures::stream::iter(entries)
        })
        .boxed()
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> ObjectStoreResult<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> ObjectStoreResult<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> ObjectStoreResult<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// Key used throughout the integration tests
pub fn test_key() -> AggregationKey {
    AggregationKey::new("25155310", 1, 4, 1, 2.5, 30).unwrap()
}

pub fn request(use_cache: bool) -> AggregationRequest {
    AggregationRequest::new(test_key(), use_cache)
}

/// One fragment line with a fixed aperture position
pub fn fragment_line(time: f64, flux: f32) -> String {
    fragment_line_at(time, flux, 1021, 877)
}

pub fn fragment_line_at(time: f64, flux: f32, x: i32, y: i32) -> String {
    format!("{time},{flux},12.5,0,{x},{y},84.291188,-80.469119")
}

/// Store a fragment body under the key's prefix
pub async fn put_fragment(store: &dyn ObjectStore, key: &AggregationKey, name: &str, body: &str) {
    let location = Path::from(format!("{}/{}", key.fragment_prefix(), name));
    store
        .put(&location, PutPayload::from(Bytes::from(body.to_string())))
        .await
        .unwrap();
}

/// Fragments with the given times, named so the store lists them in
/// argument order
pub async fn seed_fragments(store: &dyn ObjectStore, key: &AggregationKey, times: &[f64]) {
    for (i, t) in times.iter().enumerate() {
        let name = format!("cutout_{:04}.csv", i);
        put_fragment(store, key, &name, &fragment_line(*t, 1000.0 + i as f32)).await;
    }
}

/// Pipeline over the given stores with a fixed generation timestamp and a
/// scratch root the test owns
pub fn pipeline(
    config: AggregatorConfig,
    fragments: Arc<dyn ObjectStore>,
    artifacts: Arc<dyn ObjectStore>,
) -> AggregationPipeline {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2018, 8, 22, 12, 0, 0).unwrap());
    AggregationPipeline::with_clock(config, fragments, artifacts, Arc::new(clock))
}

pub fn config_with_scratch(scratch_root: PathBuf) -> AggregatorConfig {
    AggregatorConfig {
        scratch_root,
        ..Default::default()
    }
}

/// Entries left under a scratch root
pub fn scratch_entries(root: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(dir) => dir.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub async fn read_artifact(store: &dyn ObjectStore, address: &Path) -> Bytes {
    store.get(address).await.unwrap().bytes().await.unwrap()
}

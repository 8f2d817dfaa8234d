//! Per-observation measurement fragments
//!
//! The fragment side of the pipeline is responsible for:
//! - Enumerating fragments under a key-derived prefix
//! - Streaming each fragment body into request-scoped scratch space
//! - Parsing fragment bytes into measurement records

mod parser;
mod scratch;
mod source;

pub use parser::parse_fragment;
pub use scratch::{ScratchSpace, StagedFile};
pub use source::FragmentSource;

use chrono::{DateTime, Utc};
use object_store::path::Path;
use object_store::ObjectMeta;
use std::fmt;

/// Addressable reference to one stored fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHandle {
    pub location: Path,
    pub size: usize,
    pub last_modified: DateTime<Utc>,
}

impl FragmentHandle {
    /// Last path segment of the fragment location
    pub fn file_name(&self) -> &str {
        self.location.filename().unwrap_or("fragment")
    }
}

impl From<ObjectMeta> for FragmentHandle {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            location: meta.location,
            size: meta.size,
            last_modified: meta.last_modified,
        }
    }
}

impl fmt::Display for FragmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

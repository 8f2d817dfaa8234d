//! Error types for lcstitch

use std::fmt;

/// Result type alias for lcstitch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by storage failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for lcstitch
#[derive(Debug)]
pub enum Error {
    /// Request key or parameters failed validation
    InvalidRequest(String),
    /// Listing or downloading from the fragment store failed, or the
    /// artifact existence probe was inconclusive
    FetchFailure { location: String, source: BoxError },
    /// One fragment's bytes did not parse
    MalformedFragment { fragment: String, reason: String },
    /// Header metadata incomplete or table encoding failed
    SerializationFailure(String),
    /// Arrow-related errors
    Arrow(arrow::error::ArrowError),
    /// Parquet-related errors
    Parquet(parquet::errors::ParquetError),
    /// Writing the artifact to the durable store failed
    PublishFailure { address: String, source: BoxError },
    /// Configuration errors
    Config(String),
    /// Local scratch IO errors
    Io(std::io::Error),
    /// Publisher state machine misuse
    Internal(String),
}

/// Failure classes reported to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    FetchFailure,
    MalformedFragment,
    SerializationFailure,
    PublishFailure,
    Config,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::FetchFailure => "fetch_failure",
            ErrorKind::MalformedFragment => "malformed_fragment",
            ErrorKind::SerializationFailure => "serialization_failure",
            ErrorKind::PublishFailure => "publish_failure",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn fetch(location: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::FetchFailure {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn publish(address: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::PublishFailure {
            address: address.into(),
            source: source.into(),
        }
    }

    pub fn malformed(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedFragment {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }

    /// Failure class of this error.
    ///
    /// Arrow and Parquet encoding errors only arise while building the
    /// artifact, so they report as serialization failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::FetchFailure { .. } => ErrorKind::FetchFailure,
            Error::MalformedFragment { .. } => ErrorKind::MalformedFragment,
            Error::SerializationFailure(_) | Error::Arrow(_) | Error::Parquet(_) => {
                ErrorKind::SerializationFailure
            }
            Error::PublishFailure { .. } => ErrorKind::PublishFailure,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether redelivering the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::FetchFailure | ErrorKind::PublishFailure | ErrorKind::Io
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FetchFailure { source, .. } => Some(source.as_ref()),
            Error::PublishFailure { source, .. } => Some(source.as_ref()),
            Error::Arrow(e) => Some(e),
            Error::Parquet(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Error::FetchFailure { location, source } => {
                write!(f, "Fetch failure at {}: {}", location, source)
            }
            Error::MalformedFragment { fragment, reason } => {
                write!(f, "Malformed fragment {}: {}", fragment, reason)
            }
            Error::SerializationFailure(msg) => write!(f, "Serialization failure: {}", msg),
            Error::Arrow(e) => write!(f, "Arrow error: {}", e),
            Error::Parquet(e) => write!(f, "Parquet error: {}", e),
            Error::PublishFailure { address, source } => {
                write!(f, "Publish failure for {}: {}", address, source)
            }
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(e: arrow::error::ArrowError) -> Self {
        Error::Arrow(e)
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Error::Parquet(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_retryability() {
        let err = Error::InvalidRequest("sector".into());
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!err.is_retryable());

        let err = Error::fetch("tic000025155310/s0001-4-1", std::io::Error::other("reset"));
        assert_eq!(err.kind(), ErrorKind::FetchFailure);
        assert!(err.is_retryable());

        let err = Error::publish("tic000025155310/x.parquet", std::io::Error::other("503"));
        assert_eq!(err.kind(), ErrorKind::PublishFailure);
        assert!(err.is_retryable());

        let err = Error::malformed("frag-1", "field 2 is not a number");
        assert_eq!(err.kind(), ErrorKind::MalformedFragment);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parquet_errors_report_as_serialization() {
        let err: Error = parquet::errors::ParquetError::General("bad page".into()).into();
        assert_eq!(err.kind(), ErrorKind::SerializationFailure);
        assert!(format!("{err}").contains("bad page"));
    }

    #[test]
    fn test_display_names_fragment() {
        let err = Error::malformed("tic1/s0001-4-1/r2.5/w30/f3.csv", "expected 8 fields, got 7");
        let msg = err.to_string();
        assert!(msg.contains("f3.csv"));
        assert!(msg.contains("expected 8 fields"));
    }
}

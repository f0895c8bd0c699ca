//! Error types for spur client operations.
//!
//! Two layers of errors exist:
//!
//! - [`ServiceError`] is what a backend (Kinesis or the in-memory log) raises
//!   for a single remote call. It carries a coarse [`ServiceErrorKind`] so the
//!   core can tell "stream not found" apart from throttling or bad input
//!   without knowing which backend produced it.
//! - [`ClientError`] is what the core hands back to its caller. Each variant
//!   names the stage that failed, so the command layer can decide whether to
//!   report and continue (`UnknownStream`) or stop (everything else).
//!
//! ## Propagation
//!
//! Nothing in the core retries. A failed fetch or cursor acquisition ends the
//! consumer loop and the error is returned as-is; the operator re-runs the
//! command. The single reclassification is a not-found describe while
//! watching a deletion, which the lifecycle watcher reports as the terminal
//! `DELETED` status instead of an error.
//!
//! ## Examples
//!
//! ```ignore
//! use spur_client::{ClientError, StreamRegistry};
//!
//! match registry.set_current("orders") {
//!     Ok(()) => {}
//!     Err(ClientError::UnknownStream(name)) => eprintln!("no stream named {name}"),
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Coarse classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The stream or shard does not exist (or no longer exists).
    NotFound,
    /// The backend rejected the call for rate or limit reasons.
    Throttled,
    /// The stream is busy with another lifecycle operation.
    InUse,
    /// The cursor token is too old to be used.
    ExpiredCursor,
    /// The request itself was malformed.
    InvalidArgument,
    /// Anything else, including transport-level failures.
    Other,
}

/// A failure raised by a backend for one remote call.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Other, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ServiceErrorKind::NotFound
    }
}

/// Error type returned by every core operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The first cursor for a shard could not be obtained.
    ///
    /// Fatal to the consumer loop's start state. Typical causes are an
    /// unknown stream, an unknown shard id or throttling.
    #[error("Failed to acquire cursor for {stream}/{shard}: {source}")]
    CursorAcquisition {
        stream: String,
        shard: String,
        #[source]
        source: ServiceError,
    },

    /// The shard was closed and its last cursor consumed.
    ///
    /// Signals "no more data ever", as opposed to being caught up. The
    /// cursor manager refuses to silently start over from the initial
    /// position; reset the handle to read the shard again.
    #[error("Shard {shard} of stream '{stream}' is exhausted")]
    ShardExhausted { stream: String, shard: String },

    /// The transport failed while fetching a batch.
    #[error("Failed to fetch records from '{stream}': {source}")]
    Fetch {
        stream: String,
        #[source]
        source: ServiceError,
    },

    /// A registry operation named a stream that is not registered.
    #[error("Couldn't find the stream named: \"{0}\"")]
    UnknownStream(String),

    /// Describing a watched stream failed for a reason other than not-found
    /// after a deletion.
    #[error("Lifecycle watch of '{stream}' failed: {source}")]
    LifecycleWatch {
        stream: String,
        #[source]
        source: ServiceError,
    },

    /// A directory or append call failed.
    #[error("{operation} failed: {source}")]
    Service {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn service(operation: &'static str, source: ServiceError) -> Self {
        Self::Service { operation, source }
    }

    /// The backend error underneath this one, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::CursorAcquisition { source, .. }
            | Self::Fetch { source, .. }
            | Self::LifecycleWatch { source, .. }
            | Self::Service { source, .. } => Some(source),
            Self::ShardExhausted { .. } | Self::UnknownStream(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stream_message() {
        let err = ClientError::UnknownStream("orders".to_string());
        assert_eq!(err.to_string(), "Couldn't find the stream named: \"orders\"");
    }

    #[test]
    fn test_service_error_classification() {
        let err = ServiceError::not_found("Stream orders under account 123 not found");
        assert!(err.is_not_found());
        assert!(!ServiceError::other("boom").is_not_found());
    }

    #[test]
    fn test_service_error_exposed_through_client_error() {
        let err = ClientError::Fetch {
            stream: "orders".to_string(),
            source: ServiceError::new(ServiceErrorKind::Throttled, "slow down"),
        };
        assert_eq!(
            err.service_error().map(|e| e.kind),
            Some(ServiceErrorKind::Throttled)
        );
        assert!(ClientError::UnknownStream("x".into()).service_error().is_none());
    }
}

//! Error types for stream decoding.
//!
//! The engine distinguishes sharply between protocol noise and real failures.
//! Corrupt or misaligned bytes are *not* errors: the reassembler resynchronizes
//! past them silently and counts them for diagnostics. Pairing anomalies
//! (mismatches, gaps, abandoned pairs) are non-fatal events, not errors. What
//! remains in [`StreamError`] is the small set of conditions that genuinely end
//! or endanger a session:
//!
//! - **Resource exhaustion**: the reassembly buffer grew past its configured
//!   limit without producing a frame (`BufferOverflow`).
//! - **Transport faults** crossing the async boundary (`Transport`).
//! - **Use after teardown**: feeding an engine that saw a fatal transport
//!   signal (`Defunct`).
//! - **Parse failures** (`Parse`), defensive only; a scanner-validated frame
//!   start with a fully buffered body decodes infallibly, so a `Parse` error
//!   reaching a caller indicates a bug, not bad input.

use thiserror::Error;

/// Result type alias for stream decoding operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for stream decoding operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("reassembly buffer overflow: {buffered} bytes held, limit {limit}")]
    BufferOverflow { buffered: usize, limit: usize },

    #[error("parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("transport fault: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("engine is defunct after a fatal transport signal")]
    Defunct,

    #[error("event channel closed by the consumer")]
    ChannelClosed,
}

impl StreamError {
    /// Returns whether the operation may be retried on a fresh or reset instance.
    ///
    /// `BufferOverflow` and `Defunct` require the caller to reset or rebuild the
    /// engine first; `Transport` faults are retryable at the adapter's
    /// discretion; `Parse` failures indicate a decoder bug and are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::BufferOverflow { .. } => false,
            StreamError::Parse { .. } => false,
            StreamError::Transport { .. } => true,
            StreamError::Defunct => false,
            StreamError::ChannelClosed => false,
        }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for transport faults without an underlying cause.
    pub fn transport(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport faults with an underlying cause.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Transport { reason: reason.into(), source: Some(source) }
    }
}

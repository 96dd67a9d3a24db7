//! Typed errors for the color-sync core.
//!
//! All fallible operations return `Result<T, SyncError>`.
//! No panics on invalid input — every error is typed and recoverable.
//! Color extraction and packet encoding never fail by construction
//! (they degrade to black), so only discovery, connection, send, and
//! decode paths appear here.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the color-sync core.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Discovery errors ─────────────────────────────────────────
    /// The platform refused the radio/location permission required to
    /// scan. Reported once; the scan never starts.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// A transport-level scan error. The scan aborts but previously
    /// found devices are retained.
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    // ── Connection errors ────────────────────────────────────────
    /// The device was unreachable or rejected the connection.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The remote end dropped the link without a local disconnect
    /// request. Distinct from a user-initiated disconnect.
    #[error("link lost")]
    LinkLost,

    /// A single packet was not delivered. Non-fatal; the connection
    /// state is unchanged and the next tick retries naturally.
    #[error("send failed: {0}")]
    SendFailed(String),

    // ── Codec errors ─────────────────────────────────────────────
    /// A discovery response or color frame did not conform to the
    /// wire format. Dropped silently by the scan loop.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    // ── Data errors ──────────────────────────────────────────────
    /// A pixel buffer was shorter than its declared dimensions imply.
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    /// A link-phase transition was requested from the wrong state.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// A configuration value was out of its documented range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ── Ambient errors ───────────────────────────────────────────
    /// The socket/IO layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SyncError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SyncError::ChannelClosed
    }
}

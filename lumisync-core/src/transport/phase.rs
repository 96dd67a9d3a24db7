//! Transport lifecycle state machine, shared by both variants.
//!
//! ```text
//!            begin_scan              begin_connect
//!   Idle ──────────────► Scanning ─────────────────┐
//!    ▲  ◄────────────────    │                     ▼
//!    │     finish_scan       └──begin_connect──► Connecting
//!    │                                             │
//!    ├────── fail_connect ◄────────────────────────┤
//!    │                                             ▼
//!    └── disconnect / link loss ◄───────────── Connected
//! ```
//!
//! Transitions are validated and return `Result` instead of
//! panicking. A scan that starts while a connection is up does not
//! pass through this machine — the transports track that with a
//! separate flag so `Connected` is never disturbed by discovery.

use std::time::Instant;

use crate::error::SyncError;

// ── LinkPhase ────────────────────────────────────────────────────

/// The current lifecycle phase of a transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkPhase {
    /// No scan, no connection. Initial / terminal state.
    #[default]
    Idle,

    /// A bounded discovery window is running.
    Scanning,

    /// Connection attempt in flight.
    Connecting,

    /// One device is connected.
    Connected {
        /// When the connection was established.
        since: Instant,
    },
}

impl std::fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl LinkPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, Self::Scanning)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// How long the link has been up. `None` unless connected.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Scanning`.
    ///
    /// Valid from: `Idle`, `Scanning` (a new scan supersedes the
    /// running one).
    pub fn begin_scan(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Idle | Self::Scanning => {
                *self = Self::Scanning;
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot scan: connect in progress",
            )),
        }
    }

    /// Transition back to `Idle` when a scan window ends or is
    /// stopped. A no-op from `Idle` so window expiry and an explicit
    /// stop may race.
    pub fn finish_scan(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Scanning | Self::Idle => {
                *self = Self::Idle;
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot finish scan: not scanning",
            )),
        }
    }

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`, `Scanning` (connecting stops the scan).
    pub fn begin_connect(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Idle | Self::Scanning => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot connect: not in Idle or Scanning state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Abort a connection attempt, returning to `Idle`.
    ///
    /// Valid from: `Connecting`.
    pub fn fail_connect(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Connecting => {
                *self = Self::Idle;
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot fail connect: not in Connecting state",
            )),
        }
    }

    /// Tear down the connection (user disconnect or link loss).
    ///
    /// Valid from: `Connected`, `Connecting`.
    pub fn disconnect(&mut self) -> Result<(), SyncError> {
        match self {
            Self::Connected { .. } | Self::Connecting => {
                *self = Self::Idle;
                Ok(())
            }
            _ => Err(SyncError::InvalidTransition(
                "cannot disconnect: no connection",
            )),
        }
    }

    /// Force-reset to `Idle` regardless of current state.
    pub fn force_idle(&mut self) {
        *self = Self::Idle;
    }
}

// ── Tests ────────────────────────────────────────────────────────

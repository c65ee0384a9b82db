//! Seek coalescing
//!
//! At most one seek is in flight at the engine. Requests arriving while one
//! is in flight overwrite a single pending slot; when the engine reports the
//! seek processed, the pending target (if any) is issued next.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seek state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SeekState {
    #[default]
    Idle,
    InFlight {
        target: i64,
    },
    InFlightWithPending {
        in_flight: i64,
        pending: i64,
    },
}

/// What the caller must do after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDecision {
    /// Issue this seek to the engine now
    Issue(i64),
    /// Stored as pending; `superseded` is the pending target it replaced
    Coalesced { superseded: Option<i64> },
}

/// A clamped seek target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    pub position_ms: i64,
    /// The request was at or beyond the end of the media
    pub reached_end: bool,
}

impl SeekTarget {
    /// Clamp a requested position into `[0, duration]`
    pub fn clamp(target_ms: i64, duration_ms: i64) -> Self {
        if target_ms >= duration_ms {
            Self {
                position_ms: duration_ms.max(0),
                reached_end: true,
            }
        } else {
            Self {
                position_ms: target_ms.max(0),
                reached_end: false,
            }
        }
    }
}

/// Per-session seek coordinator
#[derive(Debug, Clone, Default)]
pub struct SeekCoordinator {
    state: SeekState,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SeekState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SeekState::Idle
    }

    /// Most recent target requested and not yet processed
    pub fn last_requested(&self) -> Option<i64> {
        match self.state {
            SeekState::Idle => None,
            SeekState::InFlight { target } => Some(target),
            SeekState::InFlightWithPending { pending, .. } => Some(pending),
        }
    }

    /// Register a (clamped) seek request
    pub fn request(&mut self, target: i64) -> SeekDecision {
        let (next, decision) = match self.state {
            SeekState::Idle => (SeekState::InFlight { target }, SeekDecision::Issue(target)),
            SeekState::InFlight { target: in_flight } => (
                SeekState::InFlightWithPending {
                    in_flight,
                    pending: target,
                },
                SeekDecision::Coalesced { superseded: None },
            ),
            SeekState::InFlightWithPending { in_flight, pending } => (
                SeekState::InFlightWithPending {
                    in_flight,
                    pending: target,
                },
                SeekDecision::Coalesced {
                    superseded: Some(pending),
                },
            ),
        };
        debug!(from = ?self.state, to = ?next, "Seek requested");
        self.state = next;
        decision
    }

    /// Engine finished the in-flight seek; returns the next target to issue
    pub fn on_seek_processed(&mut self) -> Option<i64> {
        let (next, issue) = match self.state {
            SeekState::Idle => (SeekState::Idle, None),
            SeekState::InFlight { .. } => (SeekState::Idle, None),
            SeekState::InFlightWithPending { pending, .. } => {
                (SeekState::InFlight { target: pending }, Some(pending))
            }
        };
        self.state = next;
        issue
    }

    /// Forget everything (stop, new session, rejected seek)
    pub fn reset(&mut self) {
        self.state = SeekState::Idle;
    }
}

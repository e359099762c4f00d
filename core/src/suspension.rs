//! # Suspension Transitions
//!
//! The single place where a device's per-protocol "suspended" classification can
//! change.
//!
//! [`transition`] is a pure function of the current [`ProtocolHealth`], the event
//! being applied, the clock and the [`SuspensionPolicy`]. It returns the new health
//! together with a [`Transition`] describing how the classification moved. The
//! registry turns that [`Transition`] into the aggregate counter delta and never
//! touches the counters any other way, so the counters are an edge-triggered
//! derivative of this function's output.

use tokio::time::Instant;
use watchr_common::config::SuspensionPolicy;
use watchr_common::network::device::{Enrichment, Protocol, ProtocolHealth};

/// Something that happened to a device, as reported to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ProbeSuccess(Protocol),
    ProbeFailure(Protocol),
    Enrichment(Enrichment),
}

impl Outcome {
    /// What this outcome means for one protocol of the device.
    pub fn event_for(&self, protocol: Protocol) -> ProtocolEvent {
        match self {
            Outcome::ProbeSuccess(p) if *p == protocol => ProtocolEvent::Success,
            Outcome::ProbeFailure(p) if *p == protocol => ProtocolEvent::Failure,
            _ => ProtocolEvent::Untouched,
        }
    }

    /// Whether the outcome proves the device answered.
    pub fn is_observation(&self) -> bool {
        !matches!(self, Outcome::ProbeFailure(_))
    }
}

/// The per-protocol view of an [`Outcome`] (or of a removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Only the lazy expiry cleanup runs.
    Untouched,
    Success,
    Failure,
    /// The device is leaving the registry and can no longer count as suspended.
    Retire,
}

/// How one call moved a protocol's suspended classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    /// A timer that had already run out was acknowledged and cleared.
    pub expired: bool,
    /// Suspended after the expiry cleanup, before the event.
    pub was_suspended: bool,
    /// Suspended after the event.
    pub is_suspended: bool,
}

impl Transition {
    /// Change to apply to the protocol's aggregate counter. Always -1, 0 or +1.
    pub fn counter_delta(&self) -> isize {
        let cleanup: isize = -isize::from(self.expired);
        let edge: isize = isize::from(self.is_suspended) - isize::from(self.was_suspended);
        cleanup + edge
    }

    pub fn entered_suspension(&self) -> bool {
        !self.was_suspended && self.is_suspended
    }

    pub fn left_suspension(&self) -> bool {
        self.was_suspended && !self.is_suspended
    }
}

/// Applies `event` to `health` at `now`.
///
/// Order of operations:
/// 1. An expired timer is cleared along with the failure counter.
/// 2. `was_suspended` is read from the cleaned state.
/// 3. The event is applied. Success clears the protocol immediately, even in the
///    middle of a suspension window. Failure counts up and starts a window when
///    the threshold is reached while not already suspended; an open window is
///    never extended.
/// 4. `is_suspended` is read from the result.
pub fn transition(
    mut health: ProtocolHealth,
    event: ProtocolEvent,
    now: Instant,
    policy: &SuspensionPolicy,
) -> (ProtocolHealth, Transition) {
    let expired: bool = health.is_expired_at(now);
    if expired {
        health.suspended_until = None;
        health.consecutive_fails = 0;
    }

    let was_suspended: bool = health.is_suspended_at(now);

    match event {
        ProtocolEvent::Untouched => {}
        ProtocolEvent::Success => {
            health.consecutive_fails = 0;
            health.suspended_until = None;
        }
        ProtocolEvent::Failure => {
            health.consecutive_fails = health.consecutive_fails.saturating_add(1);
            if !was_suspended && health.consecutive_fails >= policy.failure_threshold {
                health.suspended_until = Some(now + policy.duration);
            }
        }
        ProtocolEvent::Retire => {
            health.suspended_until = None;
        }
    }

    let is_suspended: bool = health.is_suspended_at(now);

    (
        health,
        Transition {
            expired,
            was_suspended,
            is_suspended,
        },
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

//! Last-request-wins gate for render surfaces
//!
//! Each surface has at most one live request. Beginning a new request cancels
//! the previous one, and generations are drawn from a single counter so a
//! stale ticket can never be mistaken for a newer one, even after the slot for
//! its surface was released.

use crate::CancellationToken;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier of a raster surface that renders are issued against.
pub type SurfaceId = u64;

/// Handle for one issued render request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub surface: SurfaceId,
    pub generation: u64,
    pub token: CancellationToken,
}

impl RequestTicket {
    /// Returns `true` once the request was superseded or cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct GateState {
    next_generation: AtomicU64,
    slots: Mutex<HashMap<SurfaceId, Slot>>,
}

/// Tracks the live request of every surface.
///
/// Cloning the gate shares its state, so worker threads can check whether the
/// ticket they are serving is still current.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    state: Arc<GateState>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SurfaceId, Slot>> {
        self.state.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a request for `surface`, cancelling whatever was in flight there.
    pub fn begin(&self, surface: SurfaceId) -> RequestTicket {
        let generation = self.state.next_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = CancellationToken::new();

        let previous =
            self.slots().insert(surface, Slot { generation, token: token.clone() });
        if let Some(previous) = previous {
            previous.token.cancel();
            log::debug!(
                "surface {surface}: request {} superseded by {generation}",
                previous.generation
            );
        }

        RequestTicket { surface, generation, token }
    }

    /// Returns `true` if `ticket` is the live request of its surface and has
    /// not been cancelled.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        if ticket.is_cancelled() {
            return false;
        }

        self.slots()
            .get(&ticket.surface)
            .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// Release the slot held by `ticket`. Returns `false` when the ticket was
    /// stale, in which case its result must be discarded.
    pub fn finish(&self, ticket: &RequestTicket) -> bool {
        let mut slots = self.slots();
        let current = !ticket.is_cancelled()
            && slots.get(&ticket.surface).is_some_and(|slot| slot.generation == ticket.generation);

        if current {
            slots.remove(&ticket.surface);
        }

        current
    }

    /// Cancel the live request of `surface`, if any.
    pub fn cancel(&self, surface: SurfaceId) -> bool {
        match self.slots().remove(&surface) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut slots = self.slots();
        let count = slots.len();
        for (_, slot) in slots.drain() {
            slot.token.cancel();
        }
        count
    }

    /// Returns `true` while `surface` has a request that has not finished.
    pub fn in_flight(&self, surface: SurfaceId) -> bool {
        self.slots().contains_key(&surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_request_supersedes_older() {
        let gate = RequestGate::new();

        let first = gate.begin(1);
        let second = gate.begin(1);

        assert!(first.is_cancelled());
        assert!(!gate.is_current(&first));
        assert!(gate.is_current(&second));
        assert!(second.generation > first.generation);
    }

    #[test]
    fn test_surfaces_are_independent() {
        let gate = RequestGate::new();

        let left = gate.begin(1);
        let right = gate.begin(2);

        assert!(gate.is_current(&left));
        assert!(gate.is_current(&right));
    }

    #[test]
    fn test_finish_releases_only_current_ticket() {
        let gate = RequestGate::new();

        let stale = gate.begin(7);
        let live = gate.begin(7);

        assert!(!gate.finish(&stale));
        assert!(gate.in_flight(7));

        assert!(gate.finish(&live));
        assert!(!gate.in_flight(7));
    }

    #[test]
    fn test_stale_ticket_never_matches_after_release() {
        let gate = RequestGate::new();

        let old = gate.begin(3);
        let newer = gate.begin(3);
        assert!(gate.finish(&newer));

        let latest = gate.begin(3);
        assert!(!gate.is_current(&old));
        assert!(gate.is_current(&latest));
    }

    #[test]
    fn test_cancel_surface() {
        let gate = RequestGate::new();

        let ticket = gate.begin(4);
        assert!(gate.cancel(4));
        assert!(ticket.is_cancelled());
        assert!(!gate.finish(&ticket));
        assert!(!gate.cancel(4));
    }

    #[test]
    fn test_cancel_all() {
        let gate = RequestGate::new();

        let a = gate.begin(1);
        let b = gate.begin(2);

        assert_eq!(gate.cancel_all(), 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(!gate.in_flight(1));
    }
}

//! Inkmark Scheduler Library
//!
//! Cooperative cancellation for long-running page renders.
//!
//! Rasterizing a page can take a noticeable amount of wall-clock time, and the
//! user may navigate or zoom again before it finishes. Every render for a
//! surface is started through a [`RequestGate`], which hands out a
//! [`RequestTicket`]. Starting a newer request for the same surface cancels the
//! older ticket, so its result can be recognised as stale and dropped.
//!
//! # Example
//!
//! ```
//! use inkmark_scheduler::RequestGate;
//!
//! let gate = RequestGate::new();
//!
//! let first = gate.begin(0);
//! let second = gate.begin(0);
//!
//! // The first request was superseded and must never paint.
//! assert!(first.is_cancelled());
//! assert!(!gate.is_current(&first));
//! assert!(gate.is_current(&second));
//! ```

mod cancel;
mod gate;

pub use cancel::CancellationToken;
pub use gate::{RequestGate, RequestTicket, SurfaceId};

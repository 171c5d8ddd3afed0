//! Debounced live-preview scheduling.
//!
//! Each request bumps a shared generation counter. A render started for an
//! older generation may still run to completion, but its ticket reports it
//! as stale so the result is dropped instead of overwriting a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::ops::Ops;

/// Identifies one requested render.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer request has been made.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }
}

/// A render whose debounce window has elapsed.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub ops: Ops,
    pub ticket: RenderTicket,
}

#[derive(Debug)]
struct PendingRender {
    ops: Ops,
    requested_at: Instant,
    ticket: RenderTicket,
}

/// Coalesces bursts of preview requests into at most one render per
/// debounce window. Only the most recent request is kept.
#[derive(Debug)]
pub struct RenderScheduler {
    debounce: Duration,
    latest: Arc<AtomicU64>,
    pending: Option<PendingRender>,
}

impl RenderScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Queue `ops`, replacing any pending request and superseding any
    /// render already handed out.
    pub fn request(&mut self, ops: Ops, now: Instant) -> RenderTicket {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let ticket = RenderTicket {
            generation,
            latest: Arc::clone(&self.latest),
        };
        if self.pending.is_some() {
            trace!(target: "imgcrate::scheduler", generation, "coalesced pending render");
        }
        self.pending = Some(PendingRender {
            ops,
            requested_at: now,
            ticket: ticket.clone(),
        });
        ticket
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending request becomes due, if there is one.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.requested_at + self.debounce)
    }

    /// Hand out the pending request once its debounce window has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<RenderJob> {
        let due = self.next_due()?;
        if now < due {
            return None;
        }
        self.pending.take().map(|p| RenderJob {
            ops: p.ops,
            ticket: p.ticket,
        })
    }

    /// Drop the pending request and invalidate every outstanding ticket.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.latest.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::from_millis(16)
    }
}

//! # Event Bus
//!
//! Host-facing mirror of every dispatched particle event.
//!
//! ```text
//! ┌───────────┐  queue   ┌──────────────┐  dispatch  ┌───────────┐
//! │ Emitters  │─────────>│ EffectSystem │───────────>│ Receivers │
//! └───────────┘          └──────┬───────┘            └───────────┘
//!                               │ try_send
//!                               v
//!                        ┌──────────────┐
//!                        │ EventStream  │  (host gameplay hooks)
//!                        └──────────────┘
//! ```
//!
//! The channel is bounded. A full channel drops the event and counts it;
//! the simulation never waits on the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use filament_shared::ParticleEvent;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Producer side, owned by the effect system.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<ParticleEvent>,
    receiver: Receiver<ParticleEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver, dropped: Arc::new(AtomicU64::new(0)) }
    }

    /// Publishes an event without blocking.
    ///
    /// Returns `false` if the event was dropped.
    #[inline]
    pub fn publish(&self, event: ParticleEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// A consumer handle. Clones share one queue.
    #[must_use]
    pub fn stream(&self) -> EventStream {
        EventStream { receiver: self.receiver.clone(), dropped: Arc::clone(&self.dropped) }
    }

    /// Events dropped on a full channel so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Consumer side, handed to the host.
#[derive(Clone, Debug)]
pub struct EventStream {
    receiver: Receiver<ParticleEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventStream {
    /// Next pending event, if any.
    #[inline]
    pub fn try_next(&self) -> Option<ParticleEvent> {
        self.receiver.try_recv().ok()
    }

    /// Every pending event, oldest first.
    pub fn drain(&self) -> Vec<ParticleEvent> {
        let mut events = Vec::with_capacity(self.receiver.len());
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Events the producer had to drop.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

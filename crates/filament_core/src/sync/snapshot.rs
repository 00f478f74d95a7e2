//! # Emitter Snapshots
//!
//! A read-only copy of an emitter's live particles, republished after every
//! tick. Other emitters only ever hold a [`SnapshotHandle`] (a `Weak`), so a
//! detached emitter never lingers because someone else points at it.

use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use filament_shared::Vec3;
use parking_lot::RwLock;

/// One published particle.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SnapshotParticle {
    /// World location.
    pub location: Vec3,
    /// Velocity.
    pub velocity: Vec3,
}

/// State of an emitter at the end of its last tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitterSnapshot {
    /// Owner component origin.
    pub origin: Vec3,
    /// Number of publications so far.
    pub frame: u64,
    /// Live particles in update order.
    pub particles: Vec<SnapshotParticle>,
}

impl EmitterSnapshot {
    /// Number of published particles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// True when the emitter had no live particle.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Owning side of a snapshot.
///
/// Held by the emitter that publishes. Dropping it invalidates every handle.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    inner: Arc<RwLock<EmitterSnapshot>>,
}

impl SnapshotPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot contents.
    ///
    /// Reuses the particle vector's capacity.
    pub fn publish(&self, origin: Vec3, particles: impl IntoIterator<Item = SnapshotParticle>) {
        let mut snapshot = self.inner.write();
        snapshot.origin = origin;
        snapshot.frame += 1;
        snapshot.particles.clear();
        snapshot.particles.extend(particles);
    }

    /// Creates a weak handle for readers.
    #[must_use]
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle { inner: Arc::downgrade(&self.inner) }
    }

    /// Reads the current snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&EmitterSnapshot) -> R) -> R {
        f(&self.inner.read())
    }
}

/// Non-owning reader of a published snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Weak<RwLock<EmitterSnapshot>>,
}

impl SnapshotHandle {
    /// True while the publisher is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Runs `f` on the snapshot, or returns `None` if the publisher is gone.
    pub fn read<R>(&self, f: impl FnOnce(&EmitterSnapshot) -> R) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let guard = inner.read();
        Some(f(&guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_read() {
        let publisher = SnapshotPublisher::new();
        let handle = publisher.handle();

        publisher.publish(
            Vec3::new(1.0, 0.0, 0.0),
            [SnapshotParticle { location: Vec3::Z, velocity: Vec3::X }],
        );

        let (origin, count, frame) = handle.read(|s| (s.origin, s.len(), s.frame)).unwrap();
        assert_eq!(origin, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(count, 1);
        assert_eq!(frame, 1);
    }

    #[test]
    fn test_republish_replaces_particles() {
        let publisher = SnapshotPublisher::new();
        publisher.publish(Vec3::ZERO, vec![SnapshotParticle::default(); 3]);
        publisher.publish(Vec3::ZERO, vec![SnapshotParticle::default(); 1]);
        assert_eq!(publisher.read(EmitterSnapshot::len), 1);
    }

    #[test]
    fn test_handle_dies_with_publisher() {
        let publisher = SnapshotPublisher::new();
        let handle = publisher.handle();
        assert!(handle.is_alive());
        drop(publisher);
        assert!(!handle.is_alive());
        assert!(handle.read(|s| s.len()).is_none());
    }
}

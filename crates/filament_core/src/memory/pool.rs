//! # Particle Pool
//!
//! Fixed-stride byte storage for one emitter's particles.

use bytemuck::Pod;

use crate::error::{LayoutError, LayoutResult};
use crate::memory::PayloadLayout;
use crate::particle::{BaseParticle, HEADER_SIZE};

/// A pool of fixed-stride particle records.
///
/// `data` holds `stride * capacity` bytes. `indices` is a permutation of the
/// slots: the first `active` entries are the live particles in update order,
/// the rest are free. Spawning takes the first free slot; killing swaps the
/// dead entry to the end of the live range. Records never move.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by exactly one emitter.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ParticlePool::new(&layout, 64)?;
///
/// // Spawn - O(1), no heap allocation
/// let slot = pool.spawn().expect("pool full");
/// pool.update_header(slot, |p| p.location = origin);
///
/// // Kill - O(1)
/// pool.kill_at(0);
/// ```
#[derive(Clone, Debug)]
pub struct ParticlePool {
    /// Record storage.
    data: Box<[u8]>,
    /// Live slots first, then free slots.
    indices: Box<[u32]>,
    /// Bytes per record.
    stride: usize,
    /// Number of live particles.
    active: usize,
    /// Total capacity in records.
    capacity: usize,
}

impl ParticlePool {
    /// Creates a pool sized for `capacity` records of the layout's stride.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::EmptyPool`] when `capacity` is zero.
    pub fn new(layout: &PayloadLayout, capacity: usize) -> LayoutResult<Self> {
        Self::with_stride(layout.stride(), capacity)
    }

    /// Creates a pool with an explicit stride.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::EmptyPool`] when `capacity` is zero or the
    /// stride cannot hold the header.
    pub fn with_stride(stride: usize, capacity: usize) -> LayoutResult<Self> {
        if capacity == 0 || stride < HEADER_SIZE {
            return Err(LayoutError::EmptyPool { stride, capacity });
        }

        Ok(Self {
            data: vec![0u8; stride * capacity].into_boxed_slice(),
            indices: (0..capacity as u32).collect::<Vec<_>>().into_boxed_slice(),
            stride,
            active: 0,
            capacity,
        })
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of live particles.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active
    }

    /// Returns the record stride in bytes.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// True when no free slot remains.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.active == self.capacity
    }

    /// True when no particle is alive.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Slot of the `i`-th live particle.
    #[inline]
    #[must_use]
    pub fn slot_at(&self, i: usize) -> usize {
        self.indices[i] as usize
    }

    /// Live slots in update order.
    #[must_use]
    pub fn live_slots(&self) -> &[u32] {
        &self.indices[..self.active]
    }

    /// Position of `slot` in the live range.
    #[must_use]
    pub fn position_of(&self, slot: usize) -> Option<usize> {
        self.live_slots().iter().position(|&s| s as usize == slot)
    }

    /// Claims a free record, zeroes it, and returns its slot.
    ///
    /// Returns `None` if the pool is full.
    pub fn spawn(&mut self) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.indices[self.active] as usize;
        self.record_mut(slot).fill(0);
        self.active += 1;
        Some(slot)
    }

    /// Kills the `i`-th live particle and returns its slot.
    ///
    /// The last live particle takes its place in the update order.
    pub fn kill_at(&mut self, i: usize) -> Option<usize> {
        if i >= self.active {
            return None;
        }
        let last = self.active - 1;
        self.indices.swap(i, last);
        self.active = last;
        Some(self.indices[last] as usize)
    }

    /// Kills the particle stored in `slot`.
    pub fn kill_slot(&mut self, slot: usize) -> bool {
        match self.position_of(slot) {
            Some(i) => self.kill_at(i).is_some(),
            None => false,
        }
    }

    /// Kills every particle.
    pub fn clear(&mut self) {
        self.active = 0;
    }

    /// Raw bytes of a record.
    #[inline]
    #[must_use]
    pub fn record(&self, slot: usize) -> &[u8] {
        let start = slot * self.stride;
        &self.data[start..start + self.stride]
    }

    /// Raw mutable bytes of a record.
    #[inline]
    pub fn record_mut(&mut self, slot: usize) -> &mut [u8] {
        let start = slot * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Reads a `T` at `offset` inside a record.
    #[inline]
    #[must_use]
    pub fn read<T: Pod>(&self, slot: usize, offset: usize) -> T {
        let bytes = self.record(slot);
        bytemuck::pod_read_unaligned(&bytes[offset..offset + std::mem::size_of::<T>()])
    }

    /// Writes a `T` at `offset` inside a record.
    #[inline]
    pub fn write<T: Pod>(&mut self, slot: usize, offset: usize, value: &T) {
        let size = std::mem::size_of::<T>();
        self.record_mut(slot)[offset..offset + size].copy_from_slice(bytemuck::bytes_of(value));
    }

    /// Reads, modifies and writes back a `T`.
    #[inline]
    pub fn update<T: Pod, R>(&mut self, slot: usize, offset: usize, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value: T = self.read(slot, offset);
        let out = f(&mut value);
        self.write(slot, offset, &value);
        out
    }

    /// Reads element `index` of an array of `T` starting at `offset`.
    #[inline]
    #[must_use]
    pub fn read_elem<T: Pod>(&self, slot: usize, offset: usize, index: usize) -> T {
        self.read(slot, offset + index * std::mem::size_of::<T>())
    }

    /// Writes element `index` of an array of `T` starting at `offset`.
    #[inline]
    pub fn write_elem<T: Pod>(&mut self, slot: usize, offset: usize, index: usize, value: &T) {
        self.write(slot, offset + index * std::mem::size_of::<T>(), value);
    }

    /// Reads the particle header.
    #[inline]
    #[must_use]
    pub fn header(&self, slot: usize) -> BaseParticle {
        self.read(slot, 0)
    }

    /// Writes the particle header.
    #[inline]
    pub fn set_header(&mut self, slot: usize, header: &BaseParticle) {
        self.write(slot, 0, header);
    }

    /// Reads, modifies and writes back the header.
    #[inline]
    pub fn update_header<R>(&mut self, slot: usize, f: impl FnOnce(&mut BaseParticle) -> R) -> R {
        self.update(slot, 0, f)
    }
}

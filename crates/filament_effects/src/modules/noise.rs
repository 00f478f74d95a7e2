//! # Beam Noise
//!
//! Low-frequency noise: a ring of `F + 1` offsets per beam, laid over the
//! beam at evenly spaced points.
//!
//! ## Payload
//!
//! ```text
//! [NoiseTimer]            when noise_lock_time > 0
//! [Vec3; F + 1] current
//! [Vec3; F + 1] next      when smooth
//! [f32]  distance scale   when apply_noise_scale
//! ```
//!
//! `F` here is the configured maximum frequency; a beam that picked a lower
//! frequency uses a prefix of each array.

use bytemuck::{Pod, Zeroable};
use filament_core::ParticlePool;
use filament_shared::{Vec3, KINDA_SMALL_NUMBER, MAX_NOISE_FREQUENCY};
use serde::{Deserialize, Serialize};

use crate::distribution::{FloatDistribution, VectorDistribution};
use crate::random::ParticleRng;

/// Noise lock timer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NoiseTimer {
    /// Seconds since the last resample.
    pub rate: f32,
    /// Last frame's delta time.
    pub delta: f32,
}

/// Noise module configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseModule {
    /// Master switch.
    pub enabled: bool,
    /// Noise points per beam (upper bound when `frequency_low > 0`).
    pub frequency: u32,
    /// Lower bound of a random per-beam frequency; 0 disables the range.
    pub frequency_low: u32,
    /// Offset range, sampled at `i / F`.
    pub noise_range: VectorDistribution,
    /// Scale applied to offsets when rendering.
    pub noise_range_scale: FloatDistribution,
    /// Hermite tangent scale between noise points.
    pub noise_tension: f32,
    /// Vertices between two noise points.
    pub noise_tessellation: u32,
    /// Alternate uniform extremes across slots.
    pub oscillate: bool,
    /// Seconds between resamples. Negative freezes, zero resamples every frame.
    pub noise_lock_time: f32,
    /// Blend from current to next offsets over the lock interval.
    pub smooth: bool,
    /// Scale noise by the `noise_scale` curve at `C / F`.
    pub apply_noise_scale: bool,
    /// Distance-scale curve.
    pub noise_scale: FloatDistribution,
    /// Distance between noise points; 0 uses the full frequency.
    pub frequency_distance: f32,
    /// Apply noise at the target point too.
    pub target_noise: bool,
}

impl Default for NoiseModule {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 0,
            frequency_low: 0,
            noise_range: VectorDistribution::default(),
            noise_range_scale: FloatDistribution::constant(1.0),
            noise_tension: 0.5,
            noise_tessellation: 1,
            oscillate: false,
            noise_lock_time: 0.0,
            smooth: false,
            apply_noise_scale: false,
            noise_scale: FloatDistribution::constant(1.0),
            frequency_distance: 0.0,
            target_noise: false,
        }
    }
}

/// Byte offsets of the noise sub-fields, relative to the payload start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoiseLayout {
    /// Lock timer.
    pub timer: Option<usize>,
    /// Current offsets.
    pub current: usize,
    /// Next offsets.
    pub next: Option<usize>,
    /// Distance scale.
    pub distance_scale: Option<usize>,
    /// Slots per array (`F + 1`).
    pub points: usize,
    /// Total bytes.
    pub size: usize,
}

impl NoiseLayout {
    /// Shifts every offset by `base`.
    #[must_use]
    pub fn at(self, base: usize) -> Self {
        Self {
            timer: self.timer.map(|o| o + base),
            current: self.current + base,
            next: self.next.map(|o| o + base),
            distance_scale: self.distance_scale.map(|o| o + base),
            ..self
        }
    }
}

impl NoiseModule {
    /// True when the module produces noise.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && self.frequency > 0
    }

    /// Configured frequency clamped to the cap, and whether it was clamped.
    #[must_use]
    pub fn clamped_frequency(&self) -> (u32, bool) {
        if self.frequency > MAX_NOISE_FREQUENCY {
            (MAX_NOISE_FREQUENCY, true)
        } else {
            (self.frequency, false)
        }
    }

    /// Tessellation between noise points (at least 1).
    #[must_use]
    pub fn tessellation(&self) -> u32 {
        self.noise_tessellation.max(1)
    }

    /// True when a lock timer is kept per beam.
    #[must_use]
    pub fn uses_timer(&self) -> bool {
        self.noise_lock_time > KINDA_SMALL_NUMBER
    }

    /// Payload layout for this configuration.
    #[must_use]
    pub fn layout(&self) -> NoiseLayout {
        let points = self.clamped_frequency().0 as usize + 1;
        let array = points * std::mem::size_of::<Vec3>();
        let mut size = 0;

        let timer = self.uses_timer().then(|| {
            size += std::mem::size_of::<NoiseTimer>();
            size - std::mem::size_of::<NoiseTimer>()
        });
        let current = size;
        size += array;
        let next = self.smooth.then(|| {
            size += array;
            size - array
        });
        let distance_scale = self.apply_noise_scale.then(|| {
            size += std::mem::size_of::<f32>();
            size - std::mem::size_of::<f32>()
        });

        NoiseLayout { timer, current, next, distance_scale, points, size }
    }

    /// Picks this beam's frequency.
    ///
    /// With `frequency_low > 0` the result is `trunc(r * (F - low) + low)`.
    pub fn pick_frequency(&self, rng: &mut ParticleRng) -> u32 {
        let (max, _) = self.clamped_frequency();
        if self.frequency_low == 0 || self.frequency_low >= max {
            return max;
        }
        let low = self.frequency_low as f32;
        let picked = rng.frand() * (max as f32 - low) + low;
        (picked as u32).clamp(self.frequency_low, max)
    }

    fn oscillates(&self) -> bool {
        self.oscillate && self.noise_range.is_uniform()
    }

    fn sample_slot(&self, slot: usize, frequency: u32, extreme: i32, rng: &mut ParticleRng) -> Vec3 {
        let t = slot as f32 / frequency.max(1) as f32;
        self.noise_range.sample_extreme(t, extreme, rng)
    }

    fn fill(
        &self,
        pool: &mut ParticlePool,
        slot: usize,
        offset: usize,
        frequency: u32,
        mut extreme: i32,
        rng: &mut ParticleRng,
    ) {
        let oscillate = self.oscillates();
        for i in 0..=frequency as usize {
            extreme = if oscillate { -extreme } else { 0 };
            let value = self.sample_slot(i, frequency, extreme, rng);
            pool.write_elem(slot, offset, i, &value);
        }
    }

    /// Fills the offsets of a newly spawned beam.
    pub fn spawn(
        &self,
        pool: &mut ParticlePool,
        slot: usize,
        layout: &NoiseLayout,
        frequency: u32,
        rng: &mut ParticleRng,
    ) {
        let oscillate = self.oscillates();
        let mut extreme = -1;
        for i in 0..=frequency as usize {
            extreme = if oscillate { -extreme } else { 0 };
            let current = self.sample_slot(i, frequency, extreme, rng);
            pool.write_elem(slot, layout.current, i, &current);
            if let Some(next) = layout.next {
                let value = self.sample_slot(i, frequency, -extreme, rng);
                pool.write_elem(slot, next, i, &value);
            }
        }
        if let Some(timer) = layout.timer {
            pool.write(slot, timer, &NoiseTimer::default());
        }
        if let Some(scale) = layout.distance_scale {
            pool.write(slot, scale, &1.0f32);
        }
    }

    /// Advances the lock timer and resamples when due.
    pub fn update(
        &self,
        pool: &mut ParticlePool,
        slot: usize,
        layout: &NoiseLayout,
        frequency: u32,
        dt: f32,
        rng: &mut ParticleRng,
    ) {
        if self.noise_lock_time < 0.0 {
            return;
        }

        let Some(timer_offset) = layout.timer else {
            self.fill(pool, slot, layout.current, frequency, -1, rng);
            return;
        };

        let mut timer: NoiseTimer = pool.read(slot, timer_offset);
        timer.rate += dt;
        timer.delta = dt;
        if timer.rate > self.noise_lock_time {
            match layout.next {
                Some(next) => {
                    for i in 0..=frequency as usize {
                        let value: Vec3 = pool.read_elem(slot, next, i);
                        pool.write_elem(slot, layout.current, i, &value);
                    }
                    self.fill(pool, slot, next, frequency, 1, rng);
                }
                None => self.fill(pool, slot, layout.current, frequency, -1, rng),
            }
            timer.rate = 0.0;
        }
        pool.write(slot, timer_offset, &timer);
    }

    /// Offset of noise slot `i`, blended toward the next offsets when smoothing.
    #[must_use]
    pub fn offset_at(&self, pool: &ParticlePool, slot: usize, layout: &NoiseLayout, i: usize) -> Vec3 {
        let current: Vec3 = pool.read_elem(slot, layout.current, i);
        match (layout.next, layout.timer) {
            (Some(next), Some(timer)) => {
                let timer: NoiseTimer = pool.read(slot, timer);
                let alpha = (timer.rate / self.noise_lock_time).clamp(0.0, 1.0);
                current.lerp(pool.read_elem(slot, next, i), alpha)
            }
            _ => current,
        }
    }

    /// Samples the distance scale for `count` active points out of `frequency`.
    pub fn distance_scale(&self, count: u32, frequency: u32, rng: &mut ParticleRng) -> f32 {
        let t = count as f32 / frequency.max(1) as f32;
        self.noise_scale.sample(t, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::EffectSeed;
    use filament_core::HEADER_SIZE;

    fn module() -> NoiseModule {
        NoiseModule {
            frequency: 4,
            noise_range: VectorDistribution::uniform(Vec3::splat(-5.0), Vec3::splat(5.0)),
            ..NoiseModule::default()
        }
    }

    fn pool(layout: &NoiseLayout) -> ParticlePool {
        ParticlePool::with_stride(HEADER_SIZE + layout.size, 2).unwrap()
    }

    #[test]
    fn test_layout_optional_fields() {
        let plain = module().layout();
        assert_eq!(plain.timer, None);
        assert_eq!(plain.points, 5);
        assert_eq!(plain.size, 5 * 12);

        let full = NoiseModule { noise_lock_time: 0.5, smooth: true, apply_noise_scale: true, ..module() };
        let layout = full.layout();
        assert_eq!(layout.timer, Some(0));
        assert_eq!(layout.current, 8);
        assert_eq!(layout.next, Some(8 + 60));
        assert_eq!(layout.distance_scale, Some(8 + 120));
        assert_eq!(layout.size, 8 + 120 + 4);
    }

    #[test]
    fn test_frequency_clamped() {
        let m = NoiseModule { frequency: 500, ..module() };
        assert_eq!(m.clamped_frequency(), (MAX_NOISE_FREQUENCY, true));
        assert_eq!(m.layout().points, MAX_NOISE_FREQUENCY as usize + 1);
    }

    #[test]
    fn test_frequency_range_pick() {
        let m = NoiseModule { frequency: 10, frequency_low: 4, ..module() };
        let mut rng = ParticleRng::new(EffectSeed::new(2));
        for _ in 0..100 {
            let f = m.pick_frequency(&mut rng);
            assert!((4..=10).contains(&f));
        }
        assert_eq!(module().pick_frequency(&mut rng), 4);
    }

    #[test]
    fn test_oscillate_alternates_extremes() {
        let m = NoiseModule { oscillate: true, smooth: true, ..module() };
        let layout = m.layout().at(HEADER_SIZE);
        let mut pool = pool(&layout);
        let slot = pool.spawn().unwrap();
        let mut rng = ParticleRng::new(EffectSeed::new(9));
        m.spawn(&mut pool, slot, &layout, 4, &mut rng);

        let a: Vec3 = pool.read_elem(slot, layout.current, 0);
        let b: Vec3 = pool.read_elem(slot, layout.current, 1);
        let n: Vec3 = pool.read_elem(slot, layout.next.unwrap(), 0);
        assert_eq!(a, Vec3::splat(5.0));
        assert_eq!(b, Vec3::splat(-5.0));
        assert_eq!(n, Vec3::splat(-5.0));
    }

    #[test]
    fn test_negative_lock_time_freezes() {
        let m = NoiseModule { noise_lock_time: -1.0, ..module() };
        let layout = m.layout().at(HEADER_SIZE);
        let mut pool = pool(&layout);
        let slot = pool.spawn().unwrap();
        let mut rng = ParticleRng::new(EffectSeed::new(4));
        m.spawn(&mut pool, slot, &layout, 4, &mut rng);
        let before = pool.record(slot).to_vec();
        m.update(&mut pool, slot, &layout, 4, 0.1, &mut rng);
        assert_eq!(pool.record(slot), &before[..]);
    }

    #[test]
    fn test_lock_timer_resamples_when_due() {
        let m = NoiseModule { noise_lock_time: 0.25, ..module() };
        let layout = m.layout().at(HEADER_SIZE);
        let mut pool = pool(&layout);
        let slot = pool.spawn().unwrap();
        let mut rng = ParticleRng::new(EffectSeed::new(4));
        m.spawn(&mut pool, slot, &layout, 4, &mut rng);
        let before: Vec3 = pool.read_elem(slot, layout.current, 2);

        m.update(&mut pool, slot, &layout, 4, 0.1, &mut rng);
        assert_eq!(pool.read_elem::<Vec3>(slot, layout.current, 2), before);
        let timer: NoiseTimer = pool.read(slot, layout.timer.unwrap());
        assert!((timer.rate - 0.1).abs() < 1e-6);

        m.update(&mut pool, slot, &layout, 4, 0.2, &mut rng);
        let timer: NoiseTimer = pool.read(slot, layout.timer.unwrap());
        assert_eq!(timer.rate, 0.0);
        assert_eq!(timer.delta, 0.2);
    }

    #[test]
    fn test_smooth_blend_bounded() {
        let m = NoiseModule { noise_lock_time: 1.0, smooth: true, ..module() };
        let layout = m.layout().at(HEADER_SIZE);
        let mut pool = pool(&layout);
        let slot = pool.spawn().unwrap();
        let mut rng = ParticleRng::new(EffectSeed::new(8));
        m.spawn(&mut pool, slot, &layout, 4, &mut rng);
        for _ in 0..30 {
            m.update(&mut pool, slot, &layout, 4, 0.13, &mut rng);
            for i in 0..5 {
                assert!(m.offset_at(&pool, slot, &layout, i).max_abs() <= m.noise_range.max_abs());
            }
        }
    }
}

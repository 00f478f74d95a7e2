//! # Distributions
//!
//! Scalar and vector curves sampled by modules at emitter time or at
//! particle-relative time.
//!
//! ```toml
//! speed = { type = "constant", value = 50.0 }
//! noise_range = { type = "uniform", min = { x = -5.0, y = -5.0, z = -5.0 }, max = { x = 5.0, y = 5.0, z = 5.0 } }
//! taper_factor = { type = "curve", points = [{ t = 0.0, value = 1.0 }, { t = 1.0, value = 0.0 }] }
//! ```

use filament_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::random::ParticleRng;

/// A keyed scalar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatKey {
    /// Key time.
    pub t: f32,
    /// Value at `t`.
    pub value: f32,
}

/// A keyed vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorKey {
    /// Key time.
    pub t: f32,
    /// Value at `t`.
    pub value: Vec3,
}

/// Scalar distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FloatDistribution {
    /// Same value everywhere.
    Constant {
        /// The value.
        value: f32,
    },
    /// Uniformly random between `min` and `max`, independent of time.
    Uniform {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// Piecewise-linear curve, clamped outside its keys.
    Curve {
        /// Keys sorted by `t`.
        points: Vec<FloatKey>,
    },
}

impl Default for FloatDistribution {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl FloatDistribution {
    /// Constant distribution.
    #[must_use]
    pub const fn constant(value: f32) -> Self {
        Self::Constant { value }
    }

    /// Uniform distribution.
    #[must_use]
    pub const fn uniform(min: f32, max: f32) -> Self {
        Self::Uniform { min, max }
    }

    /// Linear ramp from `from` at 0 to `to` at 1.
    #[must_use]
    pub fn ramp(from: f32, to: f32) -> Self {
        Self::Curve {
            points: vec![FloatKey { t: 0.0, value: from }, FloatKey { t: 1.0, value: to }],
        }
    }

    /// True for the uniform variant.
    #[must_use]
    pub const fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform { .. })
    }

    /// Samples at `t`.
    pub fn sample(&self, t: f32, rng: &mut ParticleRng) -> f32 {
        self.sample_extreme(t, 0, rng)
    }

    /// Samples at `t`, forcing a uniform range to an extreme.
    ///
    /// `extreme > 0` picks `max`, `extreme < 0` picks `min`, zero is random.
    /// Non-uniform variants ignore `extreme`.
    pub fn sample_extreme(&self, t: f32, extreme: i32, rng: &mut ParticleRng) -> f32 {
        match self {
            Self::Constant { value } => *value,
            Self::Uniform { min, max } => match extreme.signum() {
                1 => *max,
                -1 => *min,
                _ => rng.range(*min, *max),
            },
            Self::Curve { points } => eval_curve(points, t, |k| k.t, |k| k.value, |a, b, f| a + (b - a) * f)
                .unwrap_or(0.0),
        }
    }

    /// Deterministic value at `t`. Uniform ranges evaluate to their midpoint.
    #[must_use]
    pub fn evaluate(&self, t: f32) -> f32 {
        match self {
            Self::Constant { value } => *value,
            Self::Uniform { min, max } => (min + max) * 0.5,
            Self::Curve { points } => eval_curve(points, t, |k| k.t, |k| k.value, |a, b, f| a + (b - a) * f)
                .unwrap_or(0.0),
        }
    }

    /// Largest absolute value the distribution can produce.
    #[must_use]
    pub fn max_abs(&self) -> f32 {
        match self {
            Self::Constant { value } => value.abs(),
            Self::Uniform { min, max } => min.abs().max(max.abs()),
            Self::Curve { points } => points.iter().fold(0.0, |m, k| m.max(k.value.abs())),
        }
    }
}

/// Vector distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VectorDistribution {
    /// Same value everywhere.
    Constant {
        /// The value.
        value: Vec3,
    },
    /// Per-component uniform between `min` and `max`.
    Uniform {
        /// Lower corner.
        min: Vec3,
        /// Upper corner.
        max: Vec3,
    },
    /// Piecewise-linear curve, clamped outside its keys.
    Curve {
        /// Keys sorted by `t`.
        points: Vec<VectorKey>,
    },
}

impl Default for VectorDistribution {
    fn default() -> Self {
        Self::constant(Vec3::ZERO)
    }
}

impl VectorDistribution {
    /// Constant distribution.
    #[must_use]
    pub const fn constant(value: Vec3) -> Self {
        Self::Constant { value }
    }

    /// Uniform distribution.
    #[must_use]
    pub const fn uniform(min: Vec3, max: Vec3) -> Self {
        Self::Uniform { min, max }
    }

    /// True for the uniform variant.
    #[must_use]
    pub const fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform { .. })
    }

    /// Samples at `t`.
    pub fn sample(&self, t: f32, rng: &mut ParticleRng) -> Vec3 {
        self.sample_extreme(t, 0, rng)
    }

    /// Samples at `t`, forcing a uniform range to an extreme.
    ///
    /// `extreme > 0` picks `max`, `extreme < 0` picks `min`, zero is random.
    pub fn sample_extreme(&self, t: f32, extreme: i32, rng: &mut ParticleRng) -> Vec3 {
        match self {
            Self::Constant { value } => *value,
            Self::Uniform { min, max } => match extreme.signum() {
                1 => *max,
                -1 => *min,
                _ => Vec3::new(
                    rng.range(min.x, max.x),
                    rng.range(min.y, max.y),
                    rng.range(min.z, max.z),
                ),
            },
            Self::Curve { points } => {
                eval_curve(points, t, |k| k.t, |k| k.value, Vec3::lerp).unwrap_or(Vec3::ZERO)
            }
        }
    }

    /// Largest absolute component the distribution can produce.
    #[must_use]
    pub fn max_abs(&self) -> f32 {
        match self {
            Self::Constant { value } => value.max_abs(),
            Self::Uniform { min, max } => min.max_abs().max(max.max_abs()),
            Self::Curve { points } => points.iter().fold(0.0, |m, k| m.max(k.value.max_abs())),
        }
    }
}

fn eval_curve<K, V: Copy>(
    keys: &[K],
    t: f32,
    key_t: impl Fn(&K) -> f32,
    key_v: impl Fn(&K) -> V,
    lerp: impl Fn(V, V, f32) -> V,
) -> Option<V> {
    let first = keys.first()?;
    if t <= key_t(first) {
        return Some(key_v(first));
    }
    for pair in keys.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (ta, tb) = (key_t(a), key_t(b));
        if t <= tb {
            let span = tb - ta;
            let f = if span > 0.0 { (t - ta) / span } else { 1.0 };
            return Some(lerp(key_v(a), key_v(b), f));
        }
    }
    keys.last().map(key_v)
}

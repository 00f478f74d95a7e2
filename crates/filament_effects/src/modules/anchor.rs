//! # Anchor Resolvers
//!
//! Source and target resolvers share one module type. Each produces a
//! world-space position, a tangent and a strength for a particle.
//!
//! ## Methods
//!
//! | Method | Position | Tangent (`Mirror`) |
//! |---|---|---|
//! | `UserSet` | host array, indexed by live order, clamped to `[0]` | host tangent array |
//! | `Emitter` | owner origin | owner forward axis |
//! | `Particle` | a particle of a published source emitter | its velocity |
//! | `Actor` | named-parameter lookup | actor forward axis |
//! | `Distribution` | `point` curve at emitter time | `tangent` curve |
//!
//! On spawn every field resolves. Afterwards a field only resolves when its
//! lock flag is clear.

use filament_core::SnapshotHandle;
use filament_shared::{AnchorSide, Transform, Vec3, DEFAULT_LOCK_RADIUS};
use serde::{Deserialize, Serialize};

use crate::distribution::{FloatDistribution, VectorDistribution};
use crate::params::ParameterHandle;
use crate::random::ParticleRng;

/// Position, tangent and strength of one beam end.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Anchor {
    /// World position.
    pub position: Vec3,
    /// Tangent direction (Hermite tangent before strength).
    pub tangent: Vec3,
    /// Tangent scale.
    pub strength: f32,
}

/// How a particle is chosen from a source emitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleSelection {
    /// Random live particle.
    #[default]
    Random,
    /// Round-robin over live particles.
    Sequential,
}

/// Where an anchor's position comes from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnchorMethod {
    /// Host-provided arrays.
    UserSet,
    /// The owner component.
    Emitter,
    /// A particle of another emitter.
    Particle {
        /// Name of the source emitter.
        emitter: String,
        /// Pick rule on first bind.
        #[serde(default)]
        selection: ParticleSelection,
    },
    /// A named actor parameter.
    Actor {
        /// Parameter name.
        name: String,
    },
    /// The module's `point` distribution.
    #[default]
    Distribution,
}

/// Where an anchor's tangent comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentMethod {
    /// Follow the position method.
    #[default]
    Mirror,
    /// Unit vector from source to target.
    Direct,
    /// Host tangent array.
    UserSet,
    /// The module's `tangent` distribution.
    Distribution,
    /// Owner forward axis.
    Emitter,
}

/// Source or target resolver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorModule {
    /// Position method.
    pub method: AnchorMethod,
    /// Tangent method.
    pub tangent_method: TangentMethod,
    /// Position curve for the distribution method.
    pub point: VectorDistribution,
    /// `point` is world space when set, otherwise owner-local.
    pub absolute: bool,
    /// Tangent curve.
    pub tangent: VectorDistribution,
    /// `tangent` is world space when set, otherwise owner-local.
    pub tangent_absolute: bool,
    /// Strength curve, sampled at particle time.
    pub strength: FloatDistribution,
    /// Keep the spawn-time position.
    pub lock_position: bool,
    /// Keep the spawn-time tangent.
    pub lock_tangent: bool,
    /// Keep the spawn-time strength.
    pub lock_strength: bool,
    /// Default per-index offsets.
    pub offsets: Vec<Vec3>,
    /// Lock radius (target side only).
    pub lock_radius: f32,
}

impl Default for AnchorModule {
    fn default() -> Self {
        Self {
            method: AnchorMethod::Distribution,
            tangent_method: TangentMethod::Mirror,
            point: VectorDistribution::default(),
            absolute: false,
            tangent: VectorDistribution::constant(Vec3::X),
            tangent_absolute: false,
            strength: FloatDistribution::constant(1.0),
            lock_position: false,
            lock_tangent: false,
            lock_strength: false,
            offsets: Vec::new(),
            lock_radius: DEFAULT_LOCK_RADIUS,
        }
    }
}

/// Host-provided anchor arrays for one side of an emitter instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostAnchors {
    /// Positions for the `UserSet` method.
    pub points: Vec<Vec3>,
    /// Tangents for the `UserSet` method.
    pub tangents: Vec<Vec3>,
    /// Strengths for the `UserSet` method.
    pub strengths: Vec<f32>,
    /// Per-index offsets overriding the module defaults.
    pub offsets: Vec<Vec3>,
}

/// Per-call inputs of a resolve.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext<'a> {
    /// Side being resolved.
    pub side: AnchorSide,
    /// Owner local-to-world.
    pub transform: &'a Transform,
    /// Emitter time.
    pub emitter_time: f32,
    /// Particle relative time.
    pub particle_time: f32,
    /// Index of the particle in live order.
    pub particle_order: usize,
    /// Named parameters.
    pub parameters: &'a ParameterHandle,
    /// Host arrays for this side.
    pub host: &'a HostAnchors,
    /// Bound source-emitter snapshot, if any.
    pub snapshot: Option<&'a SnapshotHandle>,
    /// Current position of the other anchor.
    pub opposite: Vec3,
}

/// Per-side selection state kept by the emitter instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PickCursor {
    /// Next index for sequential selection.
    pub next: usize,
}

/// What a resolve call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Refreshed {
    /// Position was written.
    pub position: bool,
    /// Tangent was written.
    pub tangent: bool,
    /// Strength was written.
    pub strength: bool,
    /// A named lookup failed.
    pub missed: bool,
    /// A particle source had no particle to bind.
    pub unresolved_particle: bool,
}

/// Resolves the per-index offset.
///
/// The instance array wins over module defaults. An index past both arrays
/// falls back to element 0 of whichever exists, then to zero.
#[must_use]
pub fn resolve_offset(instance: &[Vec3], defaults: &[Vec3], index: usize) -> Vec3 {
    instance
        .get(index)
        .or_else(|| defaults.get(index))
        .or_else(|| instance.first())
        .or_else(|| defaults.first())
        .copied()
        .unwrap_or(Vec3::ZERO)
}

fn clamped<T: Copy>(values: &[T], index: usize) -> Option<T> {
    values.get(index).or_else(|| values.first()).copied()
}

struct Sample {
    position: Vec3,
    tangent: Vec3,
}

impl AnchorModule {
    /// A resolver for the owner component.
    #[must_use]
    pub fn emitter() -> Self {
        Self { method: AnchorMethod::Emitter, ..Self::default() }
    }

    /// A resolver for a fixed point.
    #[must_use]
    pub fn fixed(point: Vec3) -> Self {
        Self { point: VectorDistribution::constant(point), absolute: true, ..Self::default() }
    }

    /// A resolver for a named actor.
    #[must_use]
    pub fn actor(name: impl Into<String>) -> Self {
        Self { method: AnchorMethod::Actor { name: name.into() }, ..Self::default() }
    }

    /// Name of the source emitter for the particle method.
    #[must_use]
    pub fn source_emitter(&self) -> Option<&str> {
        match &self.method {
            AnchorMethod::Particle { emitter, .. } => Some(emitter),
            _ => None,
        }
    }

    /// Resolves `anchor` in place.
    ///
    /// `picked` is the particle bound on a previous frame (`-1` = none).
    pub fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        anchor: &mut Anchor,
        picked: &mut i32,
        cursor: &mut PickCursor,
        spawn: bool,
        rng: &mut ParticleRng,
    ) -> Refreshed {
        let want_position = spawn || !self.lock_position;
        let want_tangent = spawn || !self.lock_tangent;
        let want_strength = spawn || !self.lock_strength;
        let mut out = Refreshed::default();

        if !(want_position || want_tangent || want_strength) {
            return out;
        }

        let forward = ctx.transform.forward_axis();
        let sample = match &self.method {
            AnchorMethod::UserSet => clamped(&ctx.host.points, ctx.particle_order).map(|position| Sample {
                position,
                tangent: clamped(&ctx.host.tangents, ctx.particle_order).unwrap_or(forward),
            }),
            AnchorMethod::Emitter => Some(Sample { position: ctx.transform.origin(), tangent: forward }),
            AnchorMethod::Particle { selection, .. } => {
                let (sample, bound) = resolve_particle(ctx, *picked, *selection, cursor, rng, forward);
                *picked = bound;
                out.unresolved_particle = bound < 0;
                Some(sample)
            }
            AnchorMethod::Actor { name } => match ctx.parameters.actor(name) {
                Some(actor) => Some(Sample { position: actor.location, tangent: actor.forward_axis() }),
                None => {
                    out.missed = true;
                    if !spawn {
                        // Keep every field from the last good frame.
                        return out;
                    }
                    Some(Sample { position: ctx.transform.origin(), tangent: forward })
                }
            },
            AnchorMethod::Distribution => None,
        };
        let sample = sample.unwrap_or_else(|| self.distribution_sample(ctx, rng));

        if want_position {
            let offset = resolve_offset(&ctx.host.offsets, &self.offsets, ctx.particle_order);
            anchor.position = sample.position + offset;
            out.position = true;
        }

        if want_tangent {
            anchor.tangent = match self.tangent_method {
                TangentMethod::Mirror => sample.tangent,
                TangentMethod::Direct => {
                    let dir = match ctx.side {
                        AnchorSide::Source => ctx.opposite - anchor.position,
                        AnchorSide::Target => anchor.position - ctx.opposite,
                    };
                    dir.try_normalize().unwrap_or(forward)
                }
                TangentMethod::UserSet => clamped(&ctx.host.tangents, ctx.particle_order).unwrap_or(forward),
                TangentMethod::Distribution => self.distribution_tangent(ctx, rng),
                TangentMethod::Emitter => forward,
            };
            out.tangent = true;
        }

        if want_strength {
            let host_strength = match self.method {
                AnchorMethod::UserSet => clamped(&ctx.host.strengths, ctx.particle_order),
                _ => None,
            };
            anchor.strength = host_strength.unwrap_or_else(|| self.strength.sample(ctx.particle_time, rng));
            out.strength = true;
        }

        out
    }

    fn distribution_sample(&self, ctx: &ResolveContext<'_>, rng: &mut ParticleRng) -> Sample {
        let point = self.point.sample(ctx.emitter_time, rng);
        let position = if self.absolute { point } else { ctx.transform.transform_point(point) };
        Sample { position, tangent: self.distribution_tangent(ctx, rng) }
    }

    fn distribution_tangent(&self, ctx: &ResolveContext<'_>, rng: &mut ParticleRng) -> Vec3 {
        let tangent = self.tangent.sample(ctx.emitter_time, rng);
        if self.tangent_absolute {
            tangent
        } else {
            ctx.transform.transform_vector(tangent)
        }
    }
}

fn resolve_particle(
    ctx: &ResolveContext<'_>,
    picked: i32,
    selection: ParticleSelection,
    cursor: &mut PickCursor,
    rng: &mut ParticleRng,
    forward: Vec3,
) -> (Sample, i32) {
    let fallback = (Sample { position: ctx.transform.origin(), tangent: forward }, -1);
    let Some(handle) = ctx.snapshot else {
        return fallback;
    };

    handle
        .read(|snapshot| {
            if snapshot.is_empty() {
                return (Sample { position: snapshot.origin, tangent: forward }, -1);
            }
            let len = snapshot.len();
            let index = match usize::try_from(picked) {
                Ok(i) if i < len => i,
                _ => match selection {
                    ParticleSelection::Random => rng.index(len),
                    ParticleSelection::Sequential => {
                        let i = cursor.next % len;
                        cursor.next = cursor.next.wrapping_add(1);
                        i
                    }
                },
            };
            let particle = snapshot.particles[index];
            let tangent = particle.velocity.try_normalize().unwrap_or(forward);
            (Sample { position: particle.location, tangent }, index as i32)
        })
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ActorState, ParameterTable};
    use crate::random::EffectSeed;
    use filament_core::{SnapshotParticle, SnapshotPublisher};
    use filament_shared::Quaternion;

    struct Fixture {
        transform: Transform,
        params: ParameterTable,
        handle: ParameterHandle,
        host: HostAnchors,
        rng: ParticleRng,
    }

    impl Fixture {
        fn new() -> Self {
            let params = ParameterTable::new();
            let handle = params.handle();
            Self {
                transform: Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
                params,
                handle,
                host: HostAnchors::default(),
                rng: ParticleRng::new(EffectSeed::new(3)),
            }
        }

        fn ctx<'a>(&'a self, snapshot: Option<&'a SnapshotHandle>) -> ResolveContext<'a> {
            ResolveContext {
                side: AnchorSide::Target,
                transform: &self.transform,
                emitter_time: 0.0,
                particle_time: 0.0,
                particle_order: 2,
                parameters: &self.handle,
                host: &self.host,
                snapshot,
                opposite: Vec3::ZERO,
            }
        }
    }

    fn resolve(module: &AnchorModule, fx: &mut Fixture, anchor: &mut Anchor, spawn: bool) -> Refreshed {
        let mut rng = fx.rng.clone();
        let ctx = fx.ctx(None);
        let out = module.resolve(&ctx, anchor, &mut -1, &mut PickCursor::default(), spawn, &mut rng);
        fx.rng = rng;
        out
    }

    #[test]
    fn test_emitter_method() {
        let mut fx = Fixture::new();
        let mut anchor = Anchor::default();
        let out = resolve(&AnchorModule::emitter(), &mut fx, &mut anchor, true);
        assert!(out.position && out.tangent && out.strength);
        assert_eq!(anchor.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(anchor.tangent, Vec3::X);
        assert_eq!(anchor.strength, 1.0);
    }

    #[test]
    fn test_local_distribution_is_transformed() {
        let mut fx = Fixture::new();
        let module = AnchorModule {
            point: VectorDistribution::constant(Vec3::new(0.0, 5.0, 0.0)),
            ..AnchorModule::default()
        };
        let mut anchor = Anchor::default();
        resolve(&module, &mut fx, &mut anchor, true);
        assert_eq!(anchor.position, Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn test_lock_flags_skip_update() {
        let mut fx = Fixture::new();
        let module = AnchorModule { lock_position: true, ..AnchorModule::emitter() };
        let mut anchor = Anchor::default();
        resolve(&module, &mut fx, &mut anchor, true);
        fx.transform.position = Vec3::new(50.0, 0.0, 0.0);
        let out = resolve(&module, &mut fx, &mut anchor, false);
        assert!(!out.position);
        assert!(out.tangent);
        assert_eq!(anchor.position, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_actor_miss_keeps_last_value() {
        let mut fx = Fixture::new();
        fx.params.set_actor("Tower", ActorState::new(Vec3::new(0.0, 0.0, 7.0), Quaternion::IDENTITY));
        let module = AnchorModule::actor("Tower");

        let mut anchor = Anchor::default();
        let out = resolve(&module, &mut fx, &mut anchor, true);
        assert!(!out.missed);
        assert_eq!(anchor.position, Vec3::new(0.0, 0.0, 7.0));

        fx.params.remove("Tower");
        let before = anchor;
        let out = resolve(&module, &mut fx, &mut anchor, false);
        assert!(out.missed);
        assert!(!out.position);
        assert_eq!(anchor, before);
    }

    #[test]
    fn test_actor_resolves_identically_twice() {
        let mut fx = Fixture::new();
        fx.params.set_actor("Tower", ActorState::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::IDENTITY));
        let module = AnchorModule::actor("Tower");
        let mut a = Anchor::default();
        let mut b = Anchor::default();
        resolve(&module, &mut fx, &mut a, false);
        resolve(&module, &mut fx, &mut b, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_set_clamps_to_first() {
        let mut fx = Fixture::new();
        fx.host.points = vec![Vec3::new(1.0, 1.0, 1.0)];
        fx.host.strengths = vec![4.0, 5.0, 6.0];
        let module = AnchorModule { method: AnchorMethod::UserSet, ..AnchorModule::default() };
        let mut anchor = Anchor::default();
        resolve(&module, &mut fx, &mut anchor, true);
        assert_eq!(anchor.position, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(anchor.strength, 6.0);
    }

    #[test]
    fn test_offset_rules() {
        let instance = [Vec3::X, Vec3::Y];
        let defaults = [Vec3::Z, Vec3::Z, Vec3::splat(9.0)];
        assert_eq!(resolve_offset(&instance, &defaults, 1), Vec3::Y);
        assert_eq!(resolve_offset(&instance, &defaults, 2), Vec3::splat(9.0));
        assert_eq!(resolve_offset(&instance, &defaults, 7), Vec3::X);
        assert_eq!(resolve_offset(&[], &defaults, 7), Vec3::Z);
        assert_eq!(resolve_offset(&[], &[], 0), Vec3::ZERO);
    }

    #[test]
    fn test_particle_method_binds_and_rebinds() {
        let fx = Fixture::new();
        let publisher = SnapshotPublisher::new();
        let handle = publisher.handle();
        let module = AnchorModule {
            method: AnchorMethod::Particle {
                emitter: "sparks".into(),
                selection: ParticleSelection::Sequential,
            },
            ..AnchorModule::default()
        };
        let mut rng = fx.rng.clone();
        let mut cursor = PickCursor::default();
        let mut picked = -1;
        let mut anchor = Anchor::default();

        // Empty source: origin of the source emitter, unresolved.
        publisher.publish(Vec3::new(0.0, 3.0, 0.0), []);
        let out = module.resolve(&fx.ctx(Some(&handle)), &mut anchor, &mut picked, &mut cursor, true, &mut rng);
        assert!(out.unresolved_particle);
        assert_eq!(picked, -1);
        assert_eq!(anchor.position, Vec3::new(0.0, 3.0, 0.0));

        publisher.publish(
            Vec3::ZERO,
            [
                SnapshotParticle { location: Vec3::new(1.0, 0.0, 0.0), velocity: Vec3::Y },
                SnapshotParticle { location: Vec3::new(2.0, 0.0, 0.0), velocity: Vec3::ZERO },
            ],
        );
        let out = module.resolve(&fx.ctx(Some(&handle)), &mut anchor, &mut picked, &mut cursor, false, &mut rng);
        assert!(!out.unresolved_particle);
        assert_eq!(picked, 0);
        assert_eq!(anchor.position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(anchor.tangent, Vec3::Y);

        // Stays bound while the particle exists.
        module.resolve(&fx.ctx(Some(&handle)), &mut anchor, &mut picked, &mut cursor, false, &mut rng);
        assert_eq!(picked, 0);
    }
}

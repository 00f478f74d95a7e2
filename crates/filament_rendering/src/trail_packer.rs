//! Trail tessellation.
//!
//! Walks each chain head to tail. Segment `i` is split into the
//! tessellation factor stored on particle `i`, following a Hermite curve
//! whose tangents are the stored chain directions. Unless the emitter clips
//! it, a segment from the live source position to the head leads the
//! ribbon.

use filament_effects::{TrailEmitter, TrailPoint, TrailView};
use filament_shared::{cubic_interp, Vec3, KINDA_SMALL_NUMBER};
use tracing::trace;

use crate::ribbon::{tex_u, RibbonBatch, RibbonPoint};
use crate::view::ViewContext;

/// Tessellates trail emitters. Holds scratch buffers reused across chains.
#[derive(Debug, Default)]
pub struct TrailPacker {
    chain: Vec<TrailPoint>,
    samples: Vec<Sample>,
    points: Vec<RibbonPoint>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    center: Vec3,
    old_center: Vec3,
    point: TrailPoint,
}

impl TrailPacker {
    /// Creates a packer with empty scratch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every chain of `emitter` with two or more points to `batch`.
    /// Returns the chains drawn.
    pub fn pack(&mut self, emitter: &TrailEmitter, view: &ViewContext, batch: &mut RibbonBatch) -> usize {
        let sheets = emitter.type_data().sheets();
        let mut drawn = 0;
        for trail in emitter.trails() {
            if self.pack_trail(emitter, &trail) {
                batch.push_ribbon(&self.points, sheets, view);
                drawn += 1;
            }
        }
        trace!(trails = drawn, vertices = batch.vertices.len(), "packed trail emitter");
        drawn
    }

    /// Centerline of the last chain packed, head first.
    #[must_use]
    pub fn centerline(&self) -> Vec<Vec3> {
        self.samples.iter().map(|s| s.center).collect()
    }

    fn pack_trail(&mut self, emitter: &TrailEmitter, trail: &TrailView<'_>) -> bool {
        let type_data = emitter.type_data();
        self.chain.clear();
        self.chain.extend(trail.points());

        if !type_data.clip_source_segment {
            let head = self.chain.first().copied();
            if let (Some(source), Some(head)) = (trail.source(), head) {
                let lead = source - head.location;
                if !lead.is_nearly_zero(KINDA_SMALL_NUMBER) {
                    let point = TrailPoint {
                        location: source,
                        old_location: source,
                        tangent: lead.normalize_or_zero(),
                        tessellation: type_data.tessellation_for(lead.length()),
                        ..head
                    };
                    self.chain.insert(0, point);
                }
            }
        }
        if self.chain.len() < 2 {
            return false;
        }

        self.subdivide();
        self.dress(emitter, trail);
        true
    }

    fn subdivide(&mut self) {
        self.samples.clear();
        for pair in self.chain.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let chord = b.location - a.location;
            let length = chord.length();
            // Tangents point toward the head; the walk runs toward the tail.
            let t0 = if a.tangent.is_nearly_zero(KINDA_SMALL_NUMBER) { chord } else { -a.tangent * length };
            let t1 = if b.tangent.is_nearly_zero(KINDA_SMALL_NUMBER) { chord } else { -b.tangent * length };
            let steps = a.tessellation.max(1);
            for s in 0..steps {
                let alpha = s as f32 / steps as f32;
                self.samples.push(Sample {
                    center: cubic_interp(a.location, t0, b.location, t1, alpha),
                    old_center: a.old_location.lerp(b.old_location, alpha),
                    point: blend(&a, &b, alpha),
                });
            }
        }
        if let Some(&tail) = self.chain.last() {
            self.samples.push(Sample { center: tail.location, old_center: tail.old_location, point: tail });
        }
    }

    fn dress(&mut self, emitter: &TrailEmitter, trail: &TrailView<'_>) {
        let type_data = emitter.type_data();
        let full_length: f32 = self.samples.windows(2).map(|w| w[0].center.distance(w[1].center)).sum();
        let last = self.samples.len() - 1;

        self.points.clear();
        let mut travelled = 0.0;
        for (j, sample) in self.samples.iter().enumerate() {
            if j > 0 {
                travelled += sample.center.distance(self.samples[j - 1].center);
            }
            let behind = self.samples[j.saturating_sub(1)].center;
            let ahead = self.samples[(j + 1).min(last)].center;
            let right = (ahead - behind).try_normalize().unwrap_or(-sample.point.tangent);
            let taper = trail.taper(j as f32 / last.max(1) as f32);
            let (u, u2) = tex_u(travelled, full_length, type_data.texture_tile, type_data.texture_tile_distance);
            self.points.push(RibbonPoint {
                center: sample.center,
                old_center: sample.old_center,
                right,
                width: sample.point.size.x * taper,
                rotation: sample.point.rotation,
                color: sample.point.color,
                u,
                u2,
                dynamic: sample.point.dynamic,
            });
        }
    }
}

fn blend(a: &TrailPoint, b: &TrailPoint, alpha: f32) -> TrailPoint {
    let mut dynamic = a.dynamic;
    for (value, target) in dynamic.iter_mut().zip(b.dynamic) {
        *value += (target - *value) * alpha;
    }
    TrailPoint {
        size: a.size.lerp(b.size, alpha),
        rotation: a.rotation + (b.rotation - a.rotation) * alpha,
        color: a.color.lerp(b.color, alpha),
        dynamic,
        ..*a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_effects::modules::SpawnPerUnit;
    use filament_effects::{EffectSystem, EffectTemplate, EmitterTemplate, ParameterTable, TrailTemplate};
    use filament_shared::Transform;

    fn comet(clip: bool, tessellation: u32) -> EffectSystem {
        let mut trail = TrailTemplate {
            spawn_per_unit: Some(SpawnPerUnit { particles_per_unit: 0.1, ..SpawnPerUnit::default() }),
            ..TrailTemplate::default()
        };
        trail.type_data.clip_source_segment = clip;
        trail.type_data.max_tessellation_between_particles = tessellation;
        let template = EffectTemplate::new("comet", vec![EmitterTemplate::trail("ribbon", trail)]);
        let table = ParameterTable::new();
        EffectSystem::new(&template, table.handle(), None).unwrap()
    }

    fn pack(system: &EffectSystem) -> (TrailPacker, RibbonBatch, usize) {
        let trail = system.emitter("ribbon").and_then(|e| e.as_trail()).unwrap();
        let mut packer = TrailPacker::new();
        let mut batch = RibbonBatch::new(false);
        let drawn = packer.pack(trail, &ViewContext::default(), &mut batch);
        (packer, batch, drawn)
    }

    #[test]
    fn test_single_particle_draws_nothing() {
        let mut system = comet(true, 1);
        system.tick(0.1);
        let (_, batch, drawn) = pack(&system);
        assert_eq!(drawn, 0);
        assert!(batch.vertices.is_empty());
    }

    #[test]
    fn test_chain_runs_head_to_tail() {
        let mut system = comet(true, 1);
        system.tick(0.1);
        system.set_transform(Transform::from_translation(Vec3::new(20.0, 0.0, 0.0)));
        system.tick(0.1);
        let (packer, batch, drawn) = pack(&system);

        assert_eq!(drawn, 1);
        let line = packer.centerline();
        assert_eq!(line.first().copied(), Some(Vec3::new(20.0, 0.0, 0.0)));
        assert_eq!(line.last().copied(), Some(Vec3::ZERO));
        assert_eq!(batch.vertices.len(), line.len() * 2);

        let head = batch.vertices.get(0).unwrap();
        let tail = batch.vertices.get(batch.vertices.len() - 1).unwrap();
        assert_eq!(head.tex_coord[2], 0.0);
        assert!((tail.tex_coord[2] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_segments_subdivide() {
        let mut system = comet(true, 4);
        system.tick(0.1);
        system.set_transform(Transform::from_translation(Vec3::new(20.0, 0.0, 0.0)));
        system.tick(0.1);
        let (packer, _, _) = pack(&system);
        let line = packer.centerline();
        // Each segment holds its own tessellation, the tail closes the strip.
        assert!(line.len() > 3);
        for pair in line.windows(2) {
            assert!(pair[1].x <= pair[0].x + 1e-3);
        }
    }

    #[test]
    fn test_source_segment_leads_unless_clipped() {
        let mut system = comet(false, 1);
        system.tick(0.1);
        system.set_transform(Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        system.tick(0.1);
        let (packer, _, drawn) = pack(&system);
        assert_eq!(drawn, 1);
        assert_eq!(packer.centerline().first().copied(), Some(Vec3::new(5.0, 0.0, 0.0)));

        let mut clipped = comet(true, 1);
        clipped.tick(0.1);
        clipped.set_transform(Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        clipped.tick(0.1);
        assert_eq!(pack(&clipped).2, 0);
    }

    #[test]
    fn test_blend_midpoint() {
        let a = TrailPoint {
            location: Vec3::ZERO,
            old_location: Vec3::ZERO,
            size: Vec3::splat(2.0),
            rotation: 0.0,
            color: filament_shared::LinearColor::new(0.0, 0.0, 0.0, 1.0),
            tangent: Vec3::X,
            tessellation: 1,
            role: filament_effects::trail::ChainRole::Start,
            dynamic: [0.0; 4],
        };
        let b = TrailPoint { size: Vec3::splat(4.0), rotation: 1.0, dynamic: [2.0; 4], ..a };
        let mid = blend(&a, &b, 0.5);
        assert_eq!(mid.size, Vec3::splat(3.0));
        assert_eq!(mid.rotation, 0.5);
        assert_eq!(mid.dynamic, [1.0; 4]);
    }
}

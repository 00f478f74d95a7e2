//! Beam tessellation.
//!
//! Rebuilds each beam's centerline from the payload the engine recorded and
//! hands it to [`RibbonBatch`]. A beam with `TriangleCount` triangles yields
//! `TriangleCount / 2 + 1` centerline points, so `(TriangleCount + 2) * Sheets`
//! vertices.
//!
//! Without noise the points are the interpolation grid (source, then the
//! Hermite control points) up to `Steps`, plus one point `TravelRatio` into
//! the next segment. With noise, `C + 2` anchors (source, `C` displaced
//! interior points, target) are joined by Hermite segments subdivided
//! `NoiseTessellation` times.

use filament_effects::modules::NoiseModule;
use filament_effects::{BeamEmitter, BeamView};
use filament_shared::{cubic_interp, Vec3};
use tracing::trace;

use crate::ribbon::{tex_u, RibbonBatch, RibbonPoint};
use crate::view::ViewContext;

/// Tessellates beam emitters. Holds scratch buffers reused across beams.
#[derive(Debug, Default)]
pub struct BeamPacker {
    anchors: Vec<Vec3>,
    centers: Vec<Vec3>,
    points: Vec<RibbonPoint>,
}

impl BeamPacker {
    /// Creates a packer with empty scratch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every live beam of `emitter` to `batch`. Returns the beams
    /// drawn.
    pub fn pack(&mut self, emitter: &BeamEmitter, view: &ViewContext, batch: &mut RibbonBatch) -> usize {
        let sheets = emitter.type_data().sheets();
        let mut drawn = 0;
        for beam in emitter.beams() {
            if self.pack_beam(emitter, &beam) {
                batch.push_ribbon(&self.points, sheets, view);
                drawn += 1;
            }
        }
        trace!(beams = drawn, vertices = batch.vertices.len(), "packed beam emitter");
        drawn
    }

    /// Centerline of `beam` as computed by the last [`BeamPacker::pack`].
    #[must_use]
    pub fn centerline(&self) -> &[Vec3] {
        &self.centers
    }

    fn pack_beam(&mut self, emitter: &BeamEmitter, beam: &BeamView<'_>) -> bool {
        let payload = beam.payload();
        if payload.triangle_count <= 0 {
            return false;
        }
        let count = payload.triangle_count as usize / 2 + 1;

        self.centers.clear();
        match emitter.noise() {
            Some(noise) => self.noisy_centerline(emitter, noise, beam, count),
            None => self.grid_centerline(emitter, beam, count),
        }
        if self.centers.len() < 2 {
            return false;
        }

        self.dress(emitter, beam);
        true
    }

    fn grid_centerline(&mut self, emitter: &BeamEmitter, beam: &BeamView<'_>, count: usize) {
        let payload = beam.payload();
        let interp = emitter.type_data().interpolation_points().max(1) as usize;
        let grid = |i: usize| grid_point(beam, interp, i);

        let steps = (payload.steps.max(0) as usize).min(interp);
        for i in 0..=steps {
            self.centers.push(grid(i));
        }
        if count > steps + 1 && steps < interp {
            self.centers.push(grid(steps).lerp(grid(steps + 1), payload.travel_ratio));
        }
        self.centers.truncate(count);
    }

    fn noisy_centerline(&mut self, emitter: &BeamEmitter, noise: &NoiseModule, beam: &BeamView<'_>, count: usize) {
        let payload = beam.payload();
        let state = beam.state();
        let header = beam.header();
        let active = state.noise_points as usize;
        let segments = active + 1;
        let scale = beam.noise_distance_scale() * noise.noise_range_scale.evaluate(header.relative_time);

        self.anchors.clear();
        self.anchors.push(payload.source_point);
        let interp = emitter.type_data().interpolation_points() as usize;
        for k in 1..segments {
            let fraction = k as f32 / segments as f32;
            let base = if interp == 0 {
                payload.source_point.lerp(payload.target_point, fraction)
            } else {
                // Noise rides on the interpolated curve.
                let at = fraction * interp as f32;
                let i = (at.floor() as usize).min(interp - 1);
                grid_point(beam, interp, i).lerp(grid_point(beam, interp, i + 1), at - i as f32)
            };
            self.anchors.push(base + beam.noise_offset(k) * scale);
        }
        let target = if noise.target_noise {
            payload.target_point + beam.noise_offset(segments.min(state.frequency as usize)) * scale
        } else {
            payload.target_point
        };
        self.anchors.push(target);

        let tessellation = noise.tessellation().max(1);
        let last = self.anchors.len() - 1;
        'segments: for k in 0..last {
            let p0 = self.anchors[k];
            let p1 = self.anchors[k + 1];
            let t0 = (p1 - self.anchors[k.saturating_sub(1)]) * noise.noise_tension;
            let t1 = (self.anchors[(k + 2).min(last)] - p0) * noise.noise_tension;
            for s in 0..tessellation {
                if self.centers.len() == count {
                    break 'segments;
                }
                self.centers.push(cubic_interp(p0, t0, p1, t1, s as f32 / tessellation as f32));
            }
        }
        if self.centers.len() < count {
            self.centers.push(self.anchors[last]);
        }
    }

    fn dress(&mut self, emitter: &BeamEmitter, beam: &BeamView<'_>) {
        let type_data = emitter.type_data();
        let payload = beam.payload();
        let header = beam.header();
        let dynamic = beam.dynamic_params();
        let full_length = payload.source_point.distance(payload.target_point);
        let fallback = payload.direction.try_normalize().unwrap_or(Vec3::X);

        self.points.clear();
        let mut travelled = 0.0;
        let last = self.centers.len() - 1;
        for (j, &center) in self.centers.iter().enumerate() {
            if j > 0 {
                travelled += center.distance(self.centers[j - 1]);
            }
            let behind = self.centers[j.saturating_sub(1)];
            let ahead = self.centers[(j + 1).min(last)];
            let right = (ahead - behind).try_normalize().unwrap_or(fallback);
            let (u, u2) = tex_u(travelled, full_length, type_data.texture_tile, type_data.texture_tile_distance);
            self.points.push(RibbonPoint {
                center,
                old_center: center,
                right,
                width: header.size.x * beam.taper(j),
                rotation: header.rotation,
                color: header.color,
                u,
                u2,
                dynamic,
            });
        }
    }
}

/// Point `i` of the source-plus-interpolated grid. Index `interp` is the
/// target.
fn grid_point(beam: &BeamView<'_>, interp: usize, i: usize) -> Vec3 {
    let payload = beam.payload();
    if i == 0 {
        return payload.source_point;
    }
    beam.interpolated_point(i - 1)
        .unwrap_or_else(|| payload.source_point.lerp(payload.target_point, i as f32 / interp as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_effects::modules::AnchorModule;
    use filament_effects::{
        BeamTemplate, EffectSystem, EffectTemplate, EmitterTemplate, FloatDistribution, ParameterTable,
        VectorDistribution,
    };

    fn system(speed: f32, interpolation_points: u32, noise: Option<NoiseModule>) -> EffectSystem {
        let mut beam = BeamTemplate {
            source: Some(AnchorModule::fixed(Vec3::ZERO)),
            target: Some(AnchorModule::fixed(Vec3::new(100.0, 0.0, 0.0))),
            noise,
            ..BeamTemplate::default()
        };
        beam.type_data.speed = speed;
        beam.type_data.interpolation_points = interpolation_points;
        beam.type_data.max_beam_count = 1;
        let template = EffectTemplate::new("packer", vec![EmitterTemplate::beam("bolt", beam)]);
        let table = ParameterTable::new();
        EffectSystem::new(&template, table.handle(), None).unwrap()
    }

    fn pack(system: &EffectSystem) -> (BeamPacker, RibbonBatch) {
        let beam = system.emitter("bolt").and_then(|e| e.as_beam()).unwrap();
        let mut packer = BeamPacker::new();
        let mut batch = RibbonBatch::new(false);
        packer.pack(beam, &ViewContext::default(), &mut batch);
        (packer, batch)
    }

    #[test]
    fn test_locked_beam_ends_at_target() {
        let mut system = system(0.0, 4, None);
        system.tick(0.1);
        let (packer, batch) = pack(&system);

        let line = packer.centerline();
        assert_eq!(line.len(), 5);
        assert_eq!(line[0], Vec3::ZERO);
        assert!((line[4] - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-3);
        assert_eq!(batch.vertices.len(), (8 + 2) * 1);
        assert_eq!(batch.ribbon_triangles(), 8);
    }

    #[test]
    fn test_growing_beam_stops_at_head() {
        let mut system = system(30.0, 4, None);
        system.tick(1.0);
        let (packer, batch) = pack(&system);

        // 30 of 100 with 25-unit steps: 1 full step plus a 0.2 partial.
        let view = system.emitter("bolt").and_then(|e| e.as_beam()).and_then(|b| b.beam(0)).unwrap();
        let partial = view.interpolated_point(0).unwrap().lerp(view.interpolated_point(1).unwrap(), 0.2);
        let line = packer.centerline();
        assert_eq!(line.len(), 3);
        assert!((line[2] - partial).length() < 1e-4);
        assert_eq!(batch.ribbon_triangles(), 4);
    }

    #[test]
    fn test_noise_subdivides_segments() {
        let noise = NoiseModule { frequency: 3, noise_tessellation: 2, ..NoiseModule::default() };
        let mut system = system(0.0, 0, Some(noise));
        system.tick(0.1);
        let (packer, batch) = pack(&system);

        // (F + 1) * T + 1 points when locked.
        assert_eq!(packer.centerline().len(), 9);
        assert_eq!(batch.vertices.len(), 18);
        assert!((packer.centerline()[8] - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_noise_anchors_follow_interpolated_curve() {
        let noise = NoiseModule { frequency: 1, noise_tessellation: 1, ..NoiseModule::default() };
        let mut beam = BeamTemplate {
            source: Some(AnchorModule {
                tangent: VectorDistribution::constant(Vec3::Y),
                strength: FloatDistribution::constant(100.0),
                ..AnchorModule::fixed(Vec3::ZERO)
            }),
            target: Some(AnchorModule::fixed(Vec3::new(100.0, 0.0, 0.0))),
            noise: Some(noise),
            ..BeamTemplate::default()
        };
        beam.type_data.speed = 0.0;
        beam.type_data.interpolation_points = 4;
        beam.type_data.max_beam_count = 1;
        let template = EffectTemplate::new("packer", vec![EmitterTemplate::beam("bolt", beam)]);
        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&template, table.handle(), None).unwrap();
        system.tick(0.1);
        let (packer, _) = pack(&system);

        // The single interior anchor sits halfway along the curve, on
        // control point 1, not on the chord.
        let view = system.emitter("bolt").and_then(|e| e.as_beam()).and_then(|b| b.beam(0)).unwrap();
        let on_curve = view.interpolated_point(1).unwrap();
        let line = packer.centerline();
        assert_eq!(line.len(), 3);
        assert!(on_curve.y.abs() > 1.0);
        assert!((line[1] - on_curve).length() < 1e-3);
    }

    #[test]
    fn test_u_spans_tile_count() {
        let mut system = system(0.0, 0, None);
        system.tick(0.1);
        let (packer, batch) = pack(&system);
        assert_eq!(packer.centerline().len(), 2);
        let last = batch.vertices.get(batch.vertices.len() - 1).unwrap();
        assert!((last.tex_coord[0] - 1.0).abs() < 1e-3);
        assert!((last.tex_coord[2] - 1.0).abs() < 1e-3);
    }
}

//! # Invariants Integration Test
//!
//! Runs beams and trails through moving anchors for a few hundred frames
//! and checks every particle at the end of every tick.

use filament_effects::beam::{triangle_count, BeamView, TaperMethod};
use filament_effects::modules::{AnchorModule, NoiseModule, SpawnPerUnit};
use filament_effects::trail::payload::link;
use filament_effects::{
    ActorState, BeamTemplate, EffectSeed, EffectSystem, EffectTemplate, EmitterTemplate, FloatDistribution,
    ParameterTable, TrailTemplate, VectorDistribution,
};
use filament_shared::{Quaternion, Transform, Vec3, KINDA_SMALL_NUMBER};

const FRAMES: usize = 240;
const DT: f32 = 1.0 / 60.0;

fn orbit(frame: usize, radius: f32) -> Vec3 {
    let angle = frame as f32 * 0.05;
    Vec3::new(radius * angle.cos(), radius * angle.sin(), 20.0)
}

fn beam_effect() -> EffectTemplate {
    let mut plain = BeamTemplate {
        source: Some(AnchorModule::emitter()),
        target: Some(AnchorModule::actor("goal")),
        ..BeamTemplate::default()
    };
    plain.type_data.speed = 120.0;
    plain.type_data.interpolation_points = 6;
    plain.type_data.max_beam_count = 4;
    plain.type_data.taper_method = TaperMethod::Full;
    plain.type_data.taper_factor = FloatDistribution::ramp(1.0, 0.2);
    plain.type_data.taper_scale = FloatDistribution::constant(0.5);
    let mut plain = EmitterTemplate::beam("plain", plain);
    plain.required.spawn_rate = FloatDistribution::constant(8.0);
    plain.required.particle_lifetime = FloatDistribution::constant(0.5);

    let mut noisy = BeamTemplate {
        source: Some(AnchorModule::emitter()),
        target: Some(AnchorModule::actor("goal")),
        noise: Some(NoiseModule {
            frequency: 5,
            noise_tessellation: 3,
            noise_range: VectorDistribution::uniform(Vec3::splat(-3.0), Vec3::splat(3.0)),
            noise_lock_time: 0.1,
            smooth: true,
            oscillate: true,
            ..NoiseModule::default()
        }),
        ..BeamTemplate::default()
    };
    noisy.type_data.speed = 200.0;
    noisy.type_data.max_beam_count = 2;
    noisy.type_data.always_on = true;
    noisy.type_data.taper_method = TaperMethod::Full;
    noisy.type_data.taper_factor = FloatDistribution::ramp(0.0, 1.0);

    EffectTemplate::new("storm", vec![plain, EmitterTemplate::beam("noisy", noisy)])
}

fn check_beam(view: &BeamView<'_>, noise: Option<&NoiseModule>, interpolation_points: u32) {
    let header = view.header();
    let payload = view.payload();
    let state = view.state();

    assert!((0.0..1.0).contains(&payload.travel_ratio), "travel ratio {}", payload.travel_ratio);
    assert!(payload.steps >= 0);

    if state.locked {
        assert_eq!(header.location.x.to_bits(), payload.target_point.x.to_bits());
        assert_eq!(header.location.y.to_bits(), payload.target_point.y.to_bits());
        assert_eq!(header.location.z.to_bits(), payload.target_point.z.to_bits());
        assert_eq!(payload.travel_ratio, 0.0);
        match noise {
            Some(_) => assert_eq!(payload.steps, state.frequency as i32),
            None => assert_eq!(payload.steps, interpolation_points.max(1) as i32),
        }
    }

    if payload.steps > 0 {
        assert!((payload.direction.length() - 1.0).abs() < 1e-4);
    }

    assert_eq!(payload.triangle_count % 2, 0);
    let expected = triangle_count(
        payload.steps,
        payload.travel_ratio,
        state.locked,
        noise.map(|n| n.noise_tessellation),
    );
    assert_eq!(payload.triangle_count, expected);

    if let Some(noise) = noise {
        let bound = noise.noise_range.max_abs() + 1e-5;
        for i in 0..=state.frequency as usize {
            let offset = view.noise_offset(i);
            assert!(offset.x.abs() <= bound && offset.y.abs() <= bound && offset.z.abs() <= bound);
        }
    }
}

fn check_taper(view: &BeamView<'_>, factor: &FloatDistribution, scale: &FloatDistribution) {
    let taper = view.taper_values();
    let last = (taper.len() - 1).max(1) as f32;
    let expected: f32 = (0..taper.len())
        .map(|i| {
            let u = i as f32 / last;
            factor.evaluate(u) * scale.evaluate(u)
        })
        .sum();
    let actual: f32 = taper.iter().sum();
    assert!((expected - actual).abs() < 1e-5, "taper sum {actual} != {expected}");
}

#[test]
fn test_beam_invariants_hold_every_frame() {
    let template = beam_effect();
    let table = ParameterTable::new();
    let mut effect = EffectSystem::new(&template, table.handle(), Some(EffectSeed::new(1234))).unwrap();

    for frame in 0..FRAMES {
        table.set_actor("goal", ActorState::new(orbit(frame, 80.0), Quaternion::IDENTITY));
        effect.set_transform(Transform::from_translation(orbit(frame, 5.0)));
        effect.tick(DT);

        for emitter in effect.emitters() {
            let beam = emitter.as_beam().unwrap();
            let type_data = beam.type_data();
            for view in beam.beams() {
                check_beam(&view, beam.noise(), type_data.interpolation_points);
                check_taper(&view, &type_data.taper_factor, &type_data.taper_scale);
            }
        }
    }

    let noisy = effect.emitter("noisy").unwrap();
    assert_eq!(noisy.active_count(), 2);
    assert_eq!(noisy.diagnostics().degenerate_beams, 0);
}

#[test]
fn test_trail_chains_stay_linked() {
    let mut trail = TrailTemplate {
        spawn_per_unit: Some(SpawnPerUnit { particles_per_unit: 0.5, ..SpawnPerUnit::default() }),
        ..TrailTemplate::default()
    };
    trail.type_data.max_particle_in_trail_count = 24;
    trail.type_data.max_tessellation_between_particles = 4;
    trail.type_data.tessellation_distance = 1.5;
    let mut ribbon = EmitterTemplate::trail("ribbon", trail);
    ribbon.required.particle_lifetime = FloatDistribution::uniform(0.2, 0.6);

    let template = EffectTemplate::new("comet", vec![ribbon]);
    let table = ParameterTable::new();
    let mut effect = EffectSystem::new(&template, table.handle(), Some(EffectSeed::new(99))).unwrap();

    for frame in 0..FRAMES {
        effect.set_transform(Transform::from_translation(orbit(frame, 40.0)));
        effect.tick(DT);

        let emitter = effect.emitter("ribbon").unwrap();
        let trail = emitter.as_trail().unwrap();
        let mut seen = Vec::new();
        for view in trail.trails() {
            let slots = view.slots();
            assert_eq!(slots.len(), view.len());
            assert_eq!(slots.first().copied(), view.head());

            let mut cursor = view.head();
            let mut prev = None;
            let mut walked = 0;
            while let Some(slot) = cursor {
                let payload = view.payload(slot);
                assert_eq!(link(payload.prev), prev);
                assert!(!payload.chain_role().is_dead());
                assert!(walked < view.len(), "chain longer than its count");
                seen.push(slot);
                prev = Some(slot);
                cursor = link(payload.next);
                walked += 1;
            }
            assert_eq!(walked, view.len());

            for point in view.points() {
                assert!(point.tessellation <= 4);
                assert!((point.tangent.length() - 1.0).abs() < 1e-4 || point.tangent.length() < KINDA_SMALL_NUMBER);
            }
        }
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seen.len(), "a particle sits in two chains");
        assert_eq!(seen.len(), trail.active_count());
    }
}

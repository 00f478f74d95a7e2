//! Benchmark for beam and trail tick throughput.
//!
//! TARGET: 2,048 noisy beams ticked well inside a 16ms frame
//!
//! Run with: cargo bench --package filament_effects --bench beam_benchmark

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use filament_effects::modules::{AnchorModule, NoiseModule, SpawnPerUnit};
use filament_effects::{
    ActorState, BeamTemplate, EffectSeed, EffectSystem, EffectTemplate, EmitterTemplate, ParameterTable,
    TrailTemplate, VectorDistribution,
};
use filament_shared::{Quaternion, Transform, Vec3, MAX_BEAMS};

fn noisy_beams(count: u32) -> EffectTemplate {
    let mut beam = BeamTemplate {
        source: Some(AnchorModule::emitter()),
        target: Some(AnchorModule::actor("goal")),
        noise: Some(NoiseModule {
            frequency: 12,
            noise_tessellation: 4,
            noise_range: VectorDistribution::uniform(Vec3::splat(-4.0), Vec3::splat(4.0)),
            noise_lock_time: 0.05,
            smooth: true,
            ..NoiseModule::default()
        }),
        ..BeamTemplate::default()
    };
    beam.type_data.speed = 400.0;
    beam.type_data.interpolation_points = 16;
    beam.type_data.max_beam_count = count;
    beam.type_data.always_on = true;
    EffectTemplate::new("bench", vec![EmitterTemplate::beam("bolt", beam)])
}

fn benchmark_beam_tick(c: &mut Criterion) {
    let table = ParameterTable::new();
    table.set_actor("goal", ActorState::new(Vec3::new(500.0, 0.0, 0.0), Quaternion::IDENTITY));
    let mut effect = EffectSystem::new(&noisy_beams(MAX_BEAMS), table.handle(), Some(EffectSeed::new(42))).unwrap();
    effect.tick(1.0 / 60.0);

    let mut group = c.benchmark_group("beam_tick");
    group.throughput(Throughput::Elements(u64::from(MAX_BEAMS)));
    group.sample_size(20);

    group.bench_function("2048_noisy_beams", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let angle = frame as f32 * 0.01;
            table.set_actor("goal", ActorState::new(Vec3::new(500.0 * angle.cos(), 500.0 * angle.sin(), 0.0), Quaternion::IDENTITY));
            effect.tick(black_box(1.0 / 60.0));
        });
    });

    group.finish();
}

fn benchmark_trail_tick(c: &mut Criterion) {
    let mut trail = TrailTemplate {
        spawn_per_unit: Some(SpawnPerUnit { particles_per_unit: 0.5, ..SpawnPerUnit::default() }),
        ..TrailTemplate::default()
    };
    trail.type_data.max_particle_in_trail_count = 200;
    trail.type_data.max_tessellation_between_particles = 8;
    trail.type_data.tessellation_distance = 0.5;
    let template = EffectTemplate::new("bench", vec![EmitterTemplate::trail("ribbon", trail)]);
    let table = ParameterTable::new();
    let mut effect = EffectSystem::new(&template, table.handle(), Some(EffectSeed::new(42))).unwrap();

    c.bench_function("trail_tick_200_particles", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let angle = frame as f32 * 0.05;
            effect.set_transform(Transform::from_translation(Vec3::new(60.0 * angle.cos(), 60.0 * angle.sin(), 0.0)));
            effect.tick(black_box(1.0 / 60.0));
        });
    });
}

criterion_group!(benches, benchmark_beam_tick, benchmark_trail_tick);
criterion_main!(benches);

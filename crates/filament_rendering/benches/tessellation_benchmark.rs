//! Benchmark for ribbon tessellation throughput.
//!
//! TARGET: 2,048 noisy beams packed well inside a 16ms frame
//!
//! Run with: cargo bench --package filament_rendering --bench tessellation_benchmark

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use filament_effects::modules::{AnchorModule, NoiseModule, SpawnPerUnit};
use filament_effects::{
    BeamTemplate, EffectSeed, EffectSystem, EffectTemplate, EmitterTemplate, ParameterTable, TrailTemplate,
    VectorDistribution,
};
use filament_rendering::{RenderPipeline, RibbonBatch, ViewContext};
use filament_shared::{Transform, Vec3, MAX_BEAMS};

fn locked_beams(count: u32) -> EffectTemplate {
    let mut beam = BeamTemplate {
        source: Some(AnchorModule::fixed(Vec3::ZERO)),
        target: Some(AnchorModule::fixed(Vec3::new(500.0, 0.0, 0.0))),
        noise: Some(NoiseModule {
            frequency: 12,
            noise_tessellation: 4,
            noise_range: VectorDistribution::uniform(Vec3::splat(-4.0), Vec3::splat(4.0)),
            ..NoiseModule::default()
        }),
        ..BeamTemplate::default()
    };
    beam.type_data.speed = 0.0;
    beam.type_data.max_beam_count = count;
    beam.type_data.always_on = true;
    beam.type_data.sheets = 2;
    EffectTemplate::new("bench", vec![EmitterTemplate::beam("bolt", beam)])
}

fn benchmark_beam_pack(c: &mut Criterion) {
    let table = ParameterTable::new();
    let mut effect = EffectSystem::new(&locked_beams(MAX_BEAMS), table.handle(), Some(EffectSeed::new(42))).unwrap();
    effect.tick(1.0 / 60.0);
    let view = ViewContext::new(Vec3::new(250.0, -400.0, 100.0), Vec3::Z);

    let emitter = effect.emitter("bolt").unwrap();
    let mut pipeline = RenderPipeline::new();
    let mut batch = RibbonBatch::for_emitter(emitter);

    let mut group = c.benchmark_group("tessellation");
    group.throughput(Throughput::Elements(u64::from(MAX_BEAMS)));
    group.bench_function("pack_2048_noisy_beams", |b| {
        b.iter(|| {
            batch.clear();
            black_box(pipeline.pack_emitter(emitter, &view, &mut batch));
        });
    });
    group.finish();
}

fn benchmark_trail_pack(c: &mut Criterion) {
    let mut trail = TrailTemplate {
        spawn_per_unit: Some(SpawnPerUnit { particles_per_unit: 0.5, ..SpawnPerUnit::default() }),
        ..TrailTemplate::default()
    };
    trail.type_data.max_particle_in_trail_count = 200;
    trail.type_data.max_tessellation_between_particles = 8;
    let template = EffectTemplate::new("bench", vec![EmitterTemplate::trail("tail", trail)]);
    let table = ParameterTable::new();
    let mut effect = EffectSystem::new(&template, table.handle(), None).unwrap();
    for frame in 0..120 {
        let angle = frame as f32 * 0.05;
        effect.set_transform(Transform::from_translation(Vec3::new(100.0 * angle.cos(), 100.0 * angle.sin(), 0.0)));
        effect.tick(1.0 / 60.0);
    }
    let view = ViewContext::default();
    let mut pipeline = RenderPipeline::new();

    c.bench_function("prepare_frame_trail_200", |b| {
        b.iter(|| black_box(pipeline.prepare_frame(&effect, &view)));
    });
}

criterion_group!(benches, benchmark_beam_pack, benchmark_trail_pack);
criterion_main!(benches);

//! # Emitter Instances
//!
//! State shared by the beam and trail engines: the particle pool, the
//! emitter clock, the random stream, diagnostics, and the event outbox.
//!
//! ## Tick Phases
//!
//! Every engine runs the same phases in the same order:
//!
//! 1. Advance the clock
//! 2. Kill expired particles (emits `Death`)
//! 3. Spawn (emits `Spawn`)
//! 4. Age survivors
//! 5. Resolve anchors, apply modifiers, refresh noise, advance the engine
//!
//! Events are only queued here. The effect system delivers them after every
//! emitter of the frame has ticked.

use filament_core::{flags, BaseParticle, ParticlePool, SnapshotHandle, SnapshotParticle};
use filament_shared::{AnchorSide, EventKind, EventRecord, ParticleEvent, Transform, Vec3};

use crate::beam::BeamEmitter;
use crate::error::{EmitterDiagnostics, RuntimeFault};
use crate::modules::{
    DynamicParamPayload, DynamicParameterModule, EmitterClock, EventGenerator, EventReceiver, HostAnchors,
    ReceiverOutcome, ReceiverState, Refreshed, RequiredModule,
};
use crate::params::ParameterHandle;
use crate::random::ParticleRng;
use crate::trail::TrailEmitter;

/// Per-frame inputs from the owner component.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    /// Owner local-to-world transform.
    pub transform: &'a Transform,
    /// Owner named-parameter table.
    pub parameters: &'a ParameterHandle,
}

/// Dynamic parameter module plus its payload offset.
#[derive(Clone, Debug)]
pub(crate) struct DynamicSlot {
    pub(crate) module: DynamicParameterModule,
    pub(crate) offset: usize,
}

/// Per-instance state shared by both engines.
#[derive(Debug)]
pub struct EmitterCore {
    pub(crate) name: String,
    pub(crate) required: RequiredModule,
    pub(crate) pool: ParticlePool,
    pub(crate) rng: ParticleRng,
    pub(crate) clock: EmitterClock,
    pub(crate) halt_spawning: bool,
    pub(crate) diagnostics: EmitterDiagnostics,
    pub(crate) dynamic: Option<DynamicSlot>,
    generators: Vec<EventGenerator>,
    receivers: Vec<(EventReceiver, ReceiverState)>,
    outbox: Vec<ParticleEvent>,
}

impl EmitterCore {
    pub(crate) fn new(
        name: String,
        required: RequiredModule,
        pool: ParticlePool,
        rng: ParticleRng,
        generators: Vec<EventGenerator>,
        receivers: Vec<EventReceiver>,
        dynamic: Option<DynamicSlot>,
    ) -> Self {
        Self {
            name,
            required,
            pool,
            rng,
            clock: EmitterClock::default(),
            halt_spawning: false,
            diagnostics: EmitterDiagnostics::default(),
            dynamic,
            generators,
            receivers: receivers.into_iter().map(|r| (r, ReceiverState::default())).collect(),
            outbox: Vec::new(),
        }
    }

    /// A fresh header for a particle born at `location`.
    pub(crate) fn new_header(&mut self, location: Vec3, velocity: Option<Vec3>) -> BaseParticle {
        let init = self.required.initial_state(self.clock.time, &mut self.rng);
        let velocity = velocity.unwrap_or(init.velocity);
        let mut header = BaseParticle {
            location,
            old_location: location,
            velocity,
            base_velocity: velocity,
            size: init.size,
            base_size: init.size,
            color: init.color,
            base_color: init.color,
            one_over_max_lifetime: init.one_over_max_lifetime,
            ..BaseParticle::default()
        };
        header.set_flag(flags::JUST_SPAWNED, true);
        header.set_flag(flags::IMMORTAL, init.one_over_max_lifetime == 0.0);
        header
    }

    /// Particles due from the spawn rate and bursts, plus the sampled rate.
    ///
    /// `None` once spawning was halted or the loop budget ran out.
    pub(crate) fn timed_spawn_count(&mut self, dt: f32) -> Option<(u32, f32)> {
        if self.halt_spawning || !self.clock.may_spawn(&self.required) {
            return None;
        }
        let rate = self.required.spawn_rate.sample(self.clock.time, &mut self.rng);
        let count = self.clock.rate_count(rate, dt) + self.clock.burst_count(&self.required);
        Some((count, rate))
    }

    /// Ages every particle spawned before this tick.
    ///
    /// With `integrate` set, locations also advance by `velocity * dt`.
    pub(crate) fn age(&mut self, dt: f32, integrate: bool) {
        for i in 0..self.pool.active_count() {
            let slot = self.pool.slot_at(i);
            self.pool.update_header(slot, |p| {
                if p.has_flag(flags::JUST_SPAWNED) {
                    p.set_flag(flags::JUST_SPAWNED, false);
                    return;
                }
                p.old_location = p.location;
                if integrate {
                    p.location += p.velocity * dt;
                }
                if !p.has_flag(flags::IMMORTAL) {
                    p.relative_time += dt * p.one_over_max_lifetime;
                }
            });
        }
    }

    /// Clears the spawn flag on particles born outside the tick, so the next
    /// tick ages them like any other.
    pub(crate) fn settle_spawned(&mut self) {
        for i in 0..self.pool.active_count() {
            let slot = self.pool.slot_at(i);
            self.pool.update_header(slot, |p| p.set_flag(flags::JUST_SPAWNED, false));
        }
    }

    /// Samples the dynamic parameter of a new particle.
    pub(crate) fn spawn_dynamic(&mut self, slot: usize, particle_time: f32) {
        if let Some(dynamic) = &self.dynamic {
            let payload = dynamic.module.spawn(particle_time, &mut self.rng);
            self.pool.write(slot, dynamic.offset, &payload);
        }
    }

    /// Refreshes per-frame dynamic parameter channels.
    pub(crate) fn update_dynamic(&mut self, slot: usize, particle_time: f32, velocity: Vec3) {
        if let Some(dynamic) = &self.dynamic {
            let mut payload: DynamicParamPayload = self.pool.read(slot, dynamic.offset);
            dynamic.module.update(&mut payload, particle_time, velocity, &mut self.rng);
            self.pool.write(slot, dynamic.offset, &payload);
        }
    }

    /// Dynamic parameter values of a particle, zero when the module is absent.
    pub(crate) fn dynamic_values(&self, slot: usize) -> [f32; 4] {
        self.dynamic
            .as_ref()
            .map_or([0.0; 4], |d| self.pool.read::<DynamicParamPayload>(slot, d.offset).values)
    }

    fn record(&self, name: &str, header: &BaseParticle) -> EventRecord {
        EventRecord {
            name: name.to_string(),
            emitter: self.name.clone(),
            emitter_time: self.clock.time,
            particle_time: header.relative_time,
            location: header.location,
            velocity: header.velocity,
            direction: header.velocity.normalize_or_zero(),
        }
    }

    fn push_matching(&mut self, kind: EventKind, header: &BaseParticle, make: impl Fn(EventRecord) -> ParticleEvent) {
        for i in 0..self.generators.len() {
            if self.generators[i].kind == kind {
                let record = self.record(&self.generators[i].name, header);
                self.outbox.push(make(record));
            }
        }
    }

    /// Queues `Spawn` events for a new particle.
    pub(crate) fn emit_spawn(&mut self, slot: usize) {
        let header = self.pool.header(slot);
        self.push_matching(EventKind::Spawn, &header, ParticleEvent::Spawn);
    }

    /// Queues `Death` events, plus last-collision reports, for a dying particle.
    pub(crate) fn emit_death(&mut self, slot: usize) {
        let header = self.pool.header(slot);
        self.push_matching(EventKind::Death, &header, ParticleEvent::Death);

        if !header.has_flag(flags::COLLIDED) {
            return;
        }
        for i in 0..self.generators.len() {
            let generator = &self.generators[i];
            if generator.kind == EventKind::Collision && generator.last_time_only {
                let record = self.record(&generator.name, &header);
                self.outbox.push(ParticleEvent::Collision { record, normal: Vec3::ZERO, hit_time: 0.0, item: -1 });
            }
        }
    }

    /// Records a host-reported collision on the `index`-th live particle.
    ///
    /// Returns `false` if no particle lives at `index`.
    pub(crate) fn report_collision(&mut self, index: usize, normal: Vec3, hit_time: f32, item: i32) -> bool {
        if index >= self.pool.active_count() {
            return false;
        }
        let slot = self.pool.slot_at(index);
        let header = self.pool.header(slot);
        let collided_before = header.has_flag(flags::COLLIDED);
        self.pool.update_header(slot, |p| p.set_flag(flags::COLLIDED, true));

        for i in 0..self.generators.len() {
            let generator = &self.generators[i];
            if generator.kind == EventKind::Collision && generator.accepts_collision(collided_before) {
                let record = self.record(&generator.name, &header);
                self.outbox.push(ParticleEvent::Collision { record, normal, hit_time, item });
            }
        }
        true
    }

    /// Counts resolve faults of one side and queues `ResolveMiss` events.
    pub(crate) fn note_resolve(&mut self, side: AnchorSide, refreshed: &Refreshed, slot: usize) {
        if refreshed.unresolved_particle {
            self.diagnostics.record(RuntimeFault::UnresolvedParticle);
        }
        if !refreshed.missed {
            return;
        }
        self.diagnostics.record(RuntimeFault::ResolveMiss);
        let header = self.pool.header(slot);
        self.push_matching(EventKind::ResolveMiss, &header, |record| ParticleEvent::ResolveMiss { record, side });
    }

    /// Moves queued events into `out`.
    pub(crate) fn drain_events(&mut self, out: &mut Vec<ParticleEvent>) {
        out.append(&mut self.outbox);
    }

    /// Runs every receiver against `event`.
    pub(crate) fn receive(&mut self, event: &ParticleEvent) -> Vec<ReceiverOutcome> {
        let rng = &mut self.rng;
        self.receivers
            .iter_mut()
            .filter_map(|(receiver, state)| receiver.receive(state, event, rng))
            .collect()
    }

    /// Published copy of the live particles.
    pub(crate) fn snapshot_particles(&self) -> impl Iterator<Item = SnapshotParticle> + '_ {
        self.pool.live_slots().iter().map(|&slot| {
            let header = self.pool.header(slot as usize);
            SnapshotParticle { location: header.location, velocity: header.velocity }
        })
    }
}

/// One emitter instance of an effect.
#[derive(Debug)]
pub enum Emitter {
    /// Beam engine.
    Beam(BeamEmitter),
    /// Trail engine.
    Trail(TrailEmitter),
}

impl Emitter {
    pub(crate) fn core(&self) -> &EmitterCore {
        match self {
            Self::Beam(beam) => &beam.core,
            Self::Trail(trail) => &trail.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut EmitterCore {
        match self {
            Self::Beam(beam) => &mut beam.core,
            Self::Trail(trail) => &mut trail.core,
        }
    }

    /// Emitter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core().name
    }

    /// Live particle count.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.core().pool.active_count()
    }

    /// Fault counters.
    #[must_use]
    pub fn diagnostics(&self) -> &EmitterDiagnostics {
        &self.core().diagnostics
    }

    /// Emitter time within the current loop.
    #[must_use]
    pub fn emitter_time(&self) -> f32 {
        self.core().clock.time
    }

    /// True once a receiver or the host halted spawning.
    #[must_use]
    pub fn is_spawning_halted(&self) -> bool {
        self.core().halt_spawning
    }

    /// Headers of the live particles, in update order.
    #[must_use]
    pub fn particles(&self) -> Vec<BaseParticle> {
        let pool = &self.core().pool;
        pool.live_slots().iter().map(|&slot| pool.header(slot as usize)).collect()
    }

    /// The beam engine, if this is a beam emitter.
    #[must_use]
    pub fn as_beam(&self) -> Option<&BeamEmitter> {
        match self {
            Self::Beam(beam) => Some(beam),
            Self::Trail(_) => None,
        }
    }

    /// The trail engine, if this is a trail emitter.
    #[must_use]
    pub fn as_trail(&self) -> Option<&TrailEmitter> {
        match self {
            Self::Beam(_) => None,
            Self::Trail(trail) => Some(trail),
        }
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32, frame: &FrameContext<'_>) {
        match self {
            Self::Beam(beam) => beam.tick(dt, frame),
            Self::Trail(trail) => trail.tick(dt, frame),
        }
    }

    /// Applies a receiver outcome.
    pub(crate) fn apply(&mut self, outcome: ReceiverOutcome, location: Vec3, frame: &FrameContext<'_>) {
        match outcome {
            ReceiverOutcome::KillAll { stop_spawning } => {
                self.kill_all();
                if stop_spawning {
                    self.core_mut().halt_spawning = true;
                }
            }
            ReceiverOutcome::HaltSpawning => self.core_mut().halt_spawning = true,
            ReceiverOutcome::Spawn { count, velocity } => match self {
                Self::Beam(beam) => beam.spawn_from_event(count, velocity, frame),
                Self::Trail(trail) => trail.spawn_from_event(count, location, velocity, frame),
            },
        }
    }

    /// Kills every live particle, emitting `Death` events.
    pub fn kill_all(&mut self) {
        match self {
            Self::Beam(beam) => beam.kill_all(),
            Self::Trail(trail) => trail.kill_all(),
        }
    }

    /// Sets host-provided anchor arrays for one side.
    ///
    /// Trails only read the source side.
    pub fn set_host_anchors(&mut self, side: AnchorSide, anchors: HostAnchors) {
        match self {
            Self::Beam(beam) => beam.set_host_anchors(side, anchors),
            Self::Trail(trail) => {
                if side == AnchorSide::Source {
                    trail.set_host_anchors(anchors);
                }
            }
        }
    }

    /// Hands this emitter the snapshot of a particle-source emitter.
    pub(crate) fn bind_source(&mut self, emitter: &str, handle: &SnapshotHandle) {
        match self {
            Self::Beam(beam) => beam.bind_source(emitter, handle),
            Self::Trail(trail) => trail.bind_source(emitter, handle),
        }
    }

    /// Names of the emitters this one reads particles from.
    pub(crate) fn source_emitters(&self) -> Vec<String> {
        match self {
            Self::Beam(beam) => beam.source_emitters(),
            Self::Trail(trail) => trail.source_emitter().into_iter().collect(),
        }
    }
}

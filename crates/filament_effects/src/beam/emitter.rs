//! # Beam Emitter
//!
//! The beam state machine. A beam is `Growing` until its head reaches the
//! target, then `Locked` for the rest of its life. Locked beams follow the
//! target wherever it moves.
//!
//! ## Update Order (per beam)
//!
//! 1. Source resolver, then source modifier
//! 2. Target resolver (or the distance projection), then target modifier
//! 3. Noise refresh
//! 4. Head motion and lock test
//! 5. Step accounting, control points, triangle count, taper

use filament_core::{BaseParticle, ParticlePool, SnapshotHandle};
use filament_shared::{
    cubic_interp, AnchorSide, Vec3, DEFAULT_LOCK_RADIUS, KINDA_SMALL_NUMBER, MAX_NOISE_FREQUENCY,
    MIN_BEAM_DISTANCE,
};

use crate::beam::payload::{Beam2Payload, BeamOffsets, BeamPayloadPlan, BeamState};
use crate::beam::type_data::{
    noise_point_count, steps_with_noise, steps_without_noise, taper_count, triangle_count, BeamMethod,
    BeamTypeData, TaperMethod,
};
use crate::config::{BeamTemplate, EmitterTemplate};
use crate::emitter::{DynamicSlot, EmitterCore, FrameContext};
use crate::error::{log_frequency_overflow, EffectResult, EmitterDiagnostics, RuntimeFault};
use crate::modules::{
    Anchor, AnchorModule, HostAnchors, ModifierPayload, NoiseLayout, NoiseModule, PickCursor, Refreshed,
    ResolveContext,
};
use crate::random::{EffectSeed, ParticleRng};

const fn side_index(side: AnchorSide) -> usize {
    match side {
        AnchorSide::Source => 0,
        AnchorSide::Target => 1,
    }
}

fn tangent_or(tangent: Vec3, fallback: Vec3) -> Vec3 {
    if tangent.is_nearly_zero(KINDA_SMALL_NUMBER) {
        fallback
    } else {
        tangent
    }
}

/// A beam emitter instance.
#[derive(Debug)]
pub struct BeamEmitter {
    pub(crate) core: EmitterCore,
    template: BeamTemplate,
    offsets: BeamOffsets,
    sources: [Option<SnapshotHandle>; 2],
    host: [HostAnchors; 2],
    cursors: [PickCursor; 2],
}

impl BeamEmitter {
    /// Attaches a beam emitter.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Layout`](crate::EffectError::Layout) if the
    /// module list produces an invalid payload layout.
    pub fn new(emitter: &EmitterTemplate, beam: &BeamTemplate, seed: EffectSeed) -> EffectResult<Self> {
        let template = beam.clone();
        let mut diagnostics = EmitterDiagnostics::default();
        let type_data = &template.type_data;

        let noise = template.noise.as_ref().filter(|n| n.is_active());
        if let Some(noise) = noise {
            if noise.clamped_frequency().1 {
                diagnostics.record(RuntimeFault::FrequencyOverflow);
                log_frequency_overflow(&emitter.name, noise.frequency, MAX_NOISE_FREQUENCY);
            }
        }

        let interpolation_points = type_data.interpolation_points();
        let noise_dims = noise.map(|n| (n.clamped_frequency().0, n.tessellation()));
        let tapers = match type_data.taper_method {
            TaperMethod::None => 0,
            TaperMethod::Full | TaperMethod::Partial => taper_count(interpolation_points, noise_dims),
        };

        let plan = BeamPayloadPlan {
            interpolation_points: interpolation_points as usize,
            noise: noise.map(NoiseModule::layout),
            source_modifier: template.source_modifier.as_ref().filter(|m| m.is_active()),
            target_modifier: template.target_modifier.as_ref().filter(|m| m.is_active()),
            dynamic_parameter: emitter.dynamic_parameter.as_ref(),
            taper_count: tapers,
        };
        let (layout, offsets) = plan.allocate()?;
        let capacity = type_data.max_beam_count() as usize;
        let pool = ParticlePool::new(&layout, capacity)?;

        let dynamic = emitter
            .dynamic_parameter
            .clone()
            .zip(offsets.dynamic_parameter)
            .map(|(module, offset)| DynamicSlot { module, offset });
        let mut core = EmitterCore::new(
            emitter.name.clone(),
            emitter.required.clone(),
            pool,
            ParticleRng::new(seed),
            emitter.events.clone(),
            emitter.receivers.clone(),
            dynamic,
        );
        core.diagnostics = diagnostics;

        tracing::info!(
            "Beam emitter '{}' attached: {} beams, stride {} bytes",
            emitter.name,
            capacity,
            layout.stride()
        );

        Ok(Self {
            core,
            template,
            offsets,
            sources: [None, None],
            host: [HostAnchors::default(), HostAnchors::default()],
            cursors: [PickCursor::default(); 2],
        })
    }

    /// Beam configuration.
    #[must_use]
    pub fn type_data(&self) -> &BeamTypeData {
        &self.template.type_data
    }

    /// Noise module, when noise is active.
    #[must_use]
    pub fn noise(&self) -> Option<&NoiseModule> {
        self.offsets.noise.and(self.template.noise.as_ref())
    }

    /// Resolved payload offsets.
    #[must_use]
    pub fn offsets(&self) -> &BeamOffsets {
        &self.offsets
    }

    /// Live beam count.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.core.pool.active_count()
    }

    /// The `index`-th live beam.
    #[must_use]
    pub fn beam(&self, index: usize) -> Option<BeamView<'_>> {
        (index < self.core.pool.active_count()).then(|| BeamView { emitter: self, slot: self.core.pool.slot_at(index) })
    }

    /// Live beams in update order.
    pub fn beams(&self) -> impl Iterator<Item = BeamView<'_>> + '_ {
        self.core.pool.live_slots().iter().map(move |&slot| BeamView { emitter: self, slot: slot as usize })
    }

    /// Sets host anchor arrays for one side.
    pub fn set_host_anchors(&mut self, side: AnchorSide, anchors: HostAnchors) {
        self.host[side_index(side)] = anchors;
    }

    pub(crate) fn bind_source(&mut self, emitter: &str, handle: &SnapshotHandle) {
        let modules = [self.template.source.as_ref(), self.template.target.as_ref()];
        for (i, module) in modules.into_iter().enumerate() {
            if module.and_then(AnchorModule::source_emitter) == Some(emitter) {
                self.sources[i] = Some(handle.clone());
            }
        }
    }

    pub(crate) fn source_emitters(&self) -> Vec<String> {
        [self.template.source.as_ref(), self.template.target.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(AnchorModule::source_emitter)
            .map(str::to_string)
            .collect()
    }

    fn lock_radius(&self) -> f32 {
        self.template.target.as_ref().map_or(DEFAULT_LOCK_RADIUS, |t| t.lock_radius)
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32, frame: &FrameContext<'_>) {
        if dt <= 0.0 {
            return;
        }
        self.core.clock.advance(&self.core.required, dt);

        self.kill_expired();

        let count = self.spawn_count(dt);
        for _ in 0..count {
            self.spawn_beam(None, frame);
        }

        self.core.age(dt, false);

        for order in 0..self.core.pool.active_count() {
            let slot = self.core.pool.slot_at(order);
            self.update_beam(slot, order, dt, frame);
        }
    }

    fn kill_expired(&mut self) {
        let mut i = self.core.pool.active_count();
        while i > 0 {
            i -= 1;
            let slot = self.core.pool.slot_at(i);
            if self.core.pool.header(slot).is_expired() {
                self.core.emit_death(slot);
                self.core.pool.kill_at(i);
            }
        }
    }

    pub(crate) fn kill_all(&mut self) {
        for i in 0..self.core.pool.active_count() {
            let slot = self.core.pool.slot_at(i);
            self.core.emit_death(slot);
        }
        tracing::debug!("Beam emitter '{}' killed {} beams", self.core.name, self.core.pool.active_count());
        self.core.pool.clear();
    }

    /// Beams to spawn this frame.
    ///
    /// While under `max_beam_count`, a frame with nothing scheduled still
    /// spawns one beam, and `always_on` tops the count up to the maximum.
    fn spawn_count(&mut self, dt: f32) -> u32 {
        let max = self.template.type_data.max_beam_count();
        let active = self.core.pool.active_count() as u32;
        let Some((mut count, rate)) = self.core.timed_spawn_count(dt) else {
            return 0;
        };
        if active < max {
            if rate <= 0.0 && count == 0 {
                count = 1;
            }
            if self.template.type_data.always_on {
                count = count.max(max - active);
            }
        }
        count.min(max)
    }

    pub(crate) fn spawn_from_event(&mut self, count: u32, velocity: Vec3, frame: &FrameContext<'_>) {
        let max = self.template.type_data.max_beam_count();
        for _ in 0..count.min(max) {
            self.spawn_beam(Some(velocity), frame);
        }
    }

    fn recycle_oldest(&mut self) {
        let offset = self.offsets.type_data;
        let pool = &self.core.pool;
        let birth = |i: usize| pool.read::<Beam2Payload>(pool.slot_at(i), offset).birth_time;
        let oldest = (0..pool.active_count()).min_by(|&a, &b| birth(a).total_cmp(&birth(b)));
        if let Some(i) = oldest {
            self.core.pool.kill_at(i);
            self.core.diagnostics.record(RuntimeFault::CapacityExhausted);
            tracing::debug!("Beam emitter '{}' recycled its oldest beam", self.core.name);
        }
    }

    fn spawn_beam(&mut self, velocity: Option<Vec3>, frame: &FrameContext<'_>) {
        let slot = match self.core.pool.spawn() {
            Some(slot) => slot,
            None => {
                self.recycle_oldest();
                let Some(slot) = self.core.pool.spawn() else {
                    return;
                };
                slot
            }
        };
        let order = self.core.pool.active_count() - 1;
        let header = self.core.new_header(frame.transform.origin(), velocity);
        self.core.pool.set_header(slot, &header);

        let mut payload = Beam2Payload {
            source_particle: -1,
            target_particle: -1,
            birth_time: self.core.clock.seconds_since_creation,
            ..Beam2Payload::default()
        };
        self.resolve_anchors(slot, order, &mut payload, true, frame);

        let mut frequency = 0;
        if let (Some(noise), Some(layout)) = (self.template.noise.as_ref(), self.offsets.noise.as_ref()) {
            frequency = noise.pick_frequency(&mut self.core.rng);
            noise.spawn(&mut self.core.pool, slot, layout, frequency, &mut self.core.rng);
        }

        let born_locked = self.template.type_data.speed == 0.0
            || payload.source_point.within_box(payload.target_point, self.lock_radius());
        payload.update_state(|s| {
            s.frequency = frequency;
            s.locked = born_locked;
        });

        let location = if born_locked { payload.target_point } else { payload.source_point };
        self.core.pool.update_header(slot, |p| {
            p.location = location;
            p.old_location = location;
        });
        self.core.pool.write(slot, self.offsets.type_data, &payload);
        self.core.spawn_dynamic(slot, 0.0);
        self.core.emit_spawn(slot);
    }

    fn resolve_anchors(
        &mut self,
        slot: usize,
        order: usize,
        payload: &mut Beam2Payload,
        spawn: bool,
        frame: &FrameContext<'_>,
    ) {
        let particle_time = self.core.pool.header(slot).relative_time;
        let emitter_time = self.core.clock.time;
        let forward = frame.transform.forward_axis();
        let all = Refreshed { position: true, tangent: true, strength: true, ..Refreshed::default() };

        let source = self.resolve_side(AnchorSide::Source, order, particle_time, payload, spawn, frame);
        let refreshed = match source {
            Some(refreshed) => {
                self.core.note_resolve(AnchorSide::Source, &refreshed, slot);
                refreshed
            }
            None => {
                let anchor = Anchor { position: frame.transform.origin(), tangent: forward, strength: 1.0 };
                payload.set_anchor(AnchorSide::Source, anchor);
                all
            }
        };
        self.apply_modifier(AnchorSide::Source, slot, payload, &refreshed, spawn, emitter_time, particle_time);

        let target = match self.template.type_data.beam_method {
            BeamMethod::Target => self.resolve_side(AnchorSide::Target, order, particle_time, payload, spawn, frame),
            BeamMethod::Distance => None,
        };
        let refreshed = match target {
            Some(refreshed) => {
                self.core.note_resolve(AnchorSide::Target, &refreshed, slot);
                refreshed
            }
            None => {
                self.project_distance(payload, particle_time, forward);
                all
            }
        };
        self.apply_modifier(AnchorSide::Target, slot, payload, &refreshed, spawn, emitter_time, particle_time);
    }

    /// Runs the resolver of one side; `None` when the side has none.
    fn resolve_side(
        &mut self,
        side: AnchorSide,
        order: usize,
        particle_time: f32,
        payload: &mut Beam2Payload,
        spawn: bool,
        frame: &FrameContext<'_>,
    ) -> Option<Refreshed> {
        let i = side_index(side);
        let (module, opposite) = match side {
            AnchorSide::Source => (self.template.source.as_ref()?, payload.target_point),
            AnchorSide::Target => (self.template.target.as_ref()?, payload.source_point),
        };
        let ctx = ResolveContext {
            side,
            transform: frame.transform,
            emitter_time: self.core.clock.time,
            particle_time,
            particle_order: order,
            parameters: frame.parameters,
            host: &self.host[i],
            snapshot: self.sources[i].as_ref(),
            opposite,
        };
        let mut anchor = payload.anchor(side);
        let refreshed =
            module.resolve(&ctx, &mut anchor, payload.picked_mut(side), &mut self.cursors[i], spawn, &mut self.core.rng);
        payload.set_anchor(side, anchor);
        Some(refreshed)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_modifier(
        &mut self,
        side: AnchorSide,
        slot: usize,
        payload: &mut Beam2Payload,
        refreshed: &Refreshed,
        spawn: bool,
        emitter_time: f32,
        particle_time: f32,
    ) {
        let (module, offset) = match side {
            AnchorSide::Source => (self.template.source_modifier.as_ref(), self.offsets.source_modifier),
            AnchorSide::Target => (self.template.target_modifier.as_ref(), self.offsets.target_modifier),
        };
        let (Some(module), Some(offset)) = (module, offset) else {
            return;
        };

        let mut anchor = payload.anchor(side);
        let mut data: ModifierPayload = self.core.pool.read(slot, offset);
        if spawn {
            module.spawn(&mut anchor, &mut data, emitter_time, particle_time, &mut self.core.rng);
        } else {
            module.update(&mut anchor, &mut data, refreshed, emitter_time, particle_time, &mut self.core.rng);
        }
        self.core.pool.write(slot, offset, &data);
        payload.set_anchor(side, anchor);
    }

    /// Target for the distance method: `|d|` below the threshold becomes the
    /// minimum beam length.
    fn project_distance(&mut self, payload: &mut Beam2Payload, particle_time: f32, forward: Vec3) {
        let mut distance = self.template.type_data.distance.sample(particle_time, &mut self.core.rng);
        if distance.abs() < KINDA_SMALL_NUMBER {
            distance = MIN_BEAM_DISTANCE;
        }
        let direction = payload.source_tangent.try_normalize().unwrap_or(forward);
        let anchor = Anchor {
            position: payload.source_point + direction * distance,
            tangent: -direction,
            strength: payload.source_strength,
        };
        payload.set_anchor(AnchorSide::Target, anchor);
    }

    fn update_beam(&mut self, slot: usize, order: usize, dt: f32, frame: &FrameContext<'_>) {
        let type_data_at = self.offsets.type_data;
        let mut payload: Beam2Payload = self.core.pool.read(slot, type_data_at);
        self.resolve_anchors(slot, order, &mut payload, false, frame);

        let mut state = payload.beam_state();
        let noise = self.template.noise.as_ref().zip(self.offsets.noise.as_ref());
        if let Some((module, layout)) = noise {
            module.update(&mut self.core.pool, slot, layout, state.frequency, dt, &mut self.core.rng);
        }

        let mut header = self.core.pool.header(slot);
        let source = payload.source_point;
        let target = payload.target_point;
        let full_mag = (target - source).length();
        let direction = (target - source).try_normalize().filter(|_| full_mag > KINDA_SMALL_NUMBER);
        let Some(direction) = direction else {
            self.core.diagnostics.record(RuntimeFault::DegenerateBeam);
            payload.triangle_count = 0;
            if state.locked {
                header.location = target;
                self.core.pool.set_header(slot, &header);
            }
            self.core.pool.write(slot, type_data_at, &payload);
            return;
        };

        let engine = BeamEngine {
            type_data: &self.template.type_data,
            noise,
            lock_radius: self.lock_radius(),
        };
        let true_mag = engine.advance_head(&mut header, &mut state, source, target, direction, dt);
        engine.account(&mut payload, &mut state, full_mag, true_mag);
        if state.locked {
            header.location = target;
        }
        payload.direction = direction;
        payload.state = state.pack();

        if let Some((module, layout)) = noise {
            if let Some(at) = layout.distance_scale {
                let scale = if module.frequency_distance > 0.0 {
                    module.distance_scale(state.noise_points, state.frequency, &mut self.core.rng)
                } else {
                    1.0
                };
                self.core.pool.write(slot, at, &scale);
            }
        }

        let forward = frame.transform.forward_axis();
        engine.write_control_points(&mut self.core.pool, slot, &self.offsets, &payload, forward);
        let travelled = if state.locked { 1.0 } else { (true_mag / full_mag).clamp(0.0, 1.0) };
        engine.write_taper(&mut self.core.pool, slot, &self.offsets, travelled);

        header.velocity = (header.location - header.old_location) / dt;
        self.core.pool.set_header(slot, &header);
        self.core.pool.write(slot, type_data_at, &payload);
        self.core.update_dynamic(slot, header.relative_time, header.velocity);
    }
}

/// Borrowed configuration for one beam update.
struct BeamEngine<'a> {
    type_data: &'a BeamTypeData,
    noise: Option<(&'a NoiseModule, &'a NoiseLayout)>,
    lock_radius: f32,
}

impl BeamEngine<'_> {
    /// Moves a growing head toward the target and returns its distance from
    /// the source.
    fn advance_head(
        &self,
        header: &mut BaseParticle,
        state: &mut BeamState,
        source: Vec3,
        target: Vec3,
        direction: Vec3,
        dt: f32,
    ) -> f32 {
        if !state.locked {
            let speed = self.type_data.speed;
            if speed == 0.0 {
                state.locked = true;
            } else {
                let heading = (target - header.location).try_normalize().unwrap_or(direction);
                let next = header.location + heading * speed * dt;
                if next.within_box(target, self.lock_radius) {
                    state.locked = true;
                } else {
                    header.location = next;
                }
            }
        }

        let full_mag = (target - source).length();
        let true_mag = (header.location - source).length();
        if !state.locked && true_mag > full_mag {
            state.locked = true;
        }
        if state.locked {
            full_mag
        } else {
            true_mag
        }
    }

    fn account(&self, payload: &mut Beam2Payload, state: &mut BeamState, full_mag: f32, true_mag: f32) {
        let interpolation_points = self.type_data.interpolation_points();
        let account = match self.noise {
            Some((module, _)) => {
                let count = noise_point_count(full_mag, state.frequency, module.frequency_distance);
                state.noise_points = count;
                steps_with_noise(full_mag, true_mag, count, state.locked)
            }
            None => steps_without_noise(full_mag, true_mag, interpolation_points, state.locked),
        };
        if account.lock {
            state.locked = true;
        }

        payload.step_size = account.step_size;
        payload.steps = account.steps;
        payload.travel_ratio = account.travel_ratio;
        payload.interpolation_steps = match self.noise {
            Some(_) => interpolation_points as i32,
            None => account.steps,
        };
        payload.triangle_count = triangle_count(
            account.steps,
            account.travel_ratio,
            state.locked,
            self.noise.map(|(module, _)| module.tessellation()),
        );
    }

    /// Hermite points between the anchors at `i / Interp`, `i = 1..=Interp`.
    fn write_control_points(
        &self,
        pool: &mut ParticlePool,
        slot: usize,
        offsets: &BeamOffsets,
        payload: &Beam2Payload,
        forward: Vec3,
    ) {
        let Some(at) = offsets.interpolated else {
            return;
        };
        let count = offsets.interpolation_points;
        let source_tangent = tangent_or(payload.source_tangent, forward) * payload.source_strength;
        let target_tangent = tangent_or(payload.target_tangent, forward) * payload.target_strength;
        for i in 0..count {
            let alpha = (i + 1) as f32 / count as f32;
            let point = cubic_interp(payload.source_point, source_tangent, payload.target_point, target_tangent, alpha);
            pool.write_elem(slot, at, i, &point);
        }
    }

    /// Taper values at evenly spaced positions along the beam.
    ///
    /// `Partial` stretches the curve over the travelled part only.
    fn write_taper(&self, pool: &mut ParticlePool, slot: usize, offsets: &BeamOffsets, travelled: f32) {
        let Some(at) = offsets.taper else {
            return;
        };
        let count = offsets.taper_count;
        let last = count.saturating_sub(1).max(1) as f32;
        for i in 0..count {
            let u = i as f32 / last;
            let u = match self.type_data.taper_method {
                TaperMethod::Partial if travelled > KINDA_SMALL_NUMBER => (u / travelled).min(1.0),
                TaperMethod::Partial => 1.0,
                TaperMethod::None | TaperMethod::Full => u,
            };
            let value = self.type_data.taper_factor.evaluate(u) * self.type_data.taper_scale.evaluate(u);
            pool.write_elem(slot, at, i, &value);
        }
    }
}

/// Read access to one live beam.
#[derive(Clone, Copy, Debug)]
pub struct BeamView<'a> {
    emitter: &'a BeamEmitter,
    slot: usize,
}

impl<'a> BeamView<'a> {
    fn pool(&self) -> &'a ParticlePool {
        &self.emitter.core.pool
    }

    /// Particle header.
    #[must_use]
    pub fn header(&self) -> BaseParticle {
        self.pool().header(self.slot)
    }

    /// Beam payload.
    #[must_use]
    pub fn payload(&self) -> Beam2Payload {
        self.pool().read(self.slot, self.emitter.offsets.type_data)
    }

    /// Unpacked state word.
    #[must_use]
    pub fn state(&self) -> BeamState {
        self.payload().beam_state()
    }

    /// Hermite control point `i`, if interpolation is on.
    #[must_use]
    pub fn interpolated_point(&self, i: usize) -> Option<Vec3> {
        let offsets = &self.emitter.offsets;
        let at = offsets.interpolated?;
        (i < offsets.interpolation_points).then(|| self.pool().read_elem(self.slot, at, i))
    }

    /// Noise offset of slot `i`, blended toward the next offsets when
    /// smoothing. Zero without noise.
    #[must_use]
    pub fn noise_offset(&self, i: usize) -> Vec3 {
        match (self.emitter.noise(), self.emitter.offsets.noise.as_ref()) {
            (Some(module), Some(layout)) if i < layout.points => module.offset_at(self.pool(), self.slot, layout, i),
            _ => Vec3::ZERO,
        }
    }

    /// Noise distance scale, 1 when not applied.
    #[must_use]
    pub fn noise_distance_scale(&self) -> f32 {
        self.emitter
            .offsets
            .noise
            .and_then(|layout| layout.distance_scale)
            .map_or(1.0, |at| self.pool().read(self.slot, at))
    }

    /// Taper value `i`, clamped to the last value; 1 without tapering.
    #[must_use]
    pub fn taper(&self, i: usize) -> f32 {
        let offsets = &self.emitter.offsets;
        match offsets.taper {
            Some(at) if offsets.taper_count > 0 => {
                self.pool().read_elem(self.slot, at, i.min(offsets.taper_count - 1))
            }
            _ => 1.0,
        }
    }

    /// Every taper value of the beam.
    #[must_use]
    pub fn taper_values(&self) -> Vec<f32> {
        (0..self.emitter.offsets.taper_count).map(|i| self.taper(i)).collect()
    }

    /// Dynamic parameter values.
    #[must_use]
    pub fn dynamic_params(&self) -> [f32; 4] {
        self.emitter.core.dynamic_values(self.slot)
    }
}

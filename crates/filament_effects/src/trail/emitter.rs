//! # Trail Emitter
//!
//! Particles linked into chains, newest at the head. Each chain follows one
//! source key: an offset of the owner or actor, or a particle of a source
//! emitter.
//!
//! ## Kill Pass
//!
//! Killing runs in two phases so links never point at a freed slot:
//!
//! 1. Mark: expired particles become `DeadTrail`, their neighbours are
//!    relinked, and a dead middle particle force-kills everything behind it
//! 2. Sweep: every `DeadTrail`/`ForceKill` particle is removed

use filament_core::{BaseParticle, ParticlePool, PayloadAllocator, PayloadTag, SnapshotHandle};
use filament_shared::{AnchorSide, LinearColor, Vec3, NULL_LINK};

use crate::config::{EmitterTemplate, TrailTemplate};
use crate::emitter::{DynamicSlot, EmitterCore, FrameContext};
use crate::error::{EffectResult, RuntimeFault};
use crate::modules::{
    resolve_offset, DynamicParameterModule, HostAnchors, ParticleSelection, Refreshed, SpawnPerUnitState,
};
use crate::random::{EffectSeed, ParticleRng};
use crate::trail::payload::{link, to_link, ChainRole, TrailPayload};
use crate::trail::type_data::{TrailSourceMethod, TrailTypeData};

/// Identity of a trail source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKey {
    /// Offset `i` of the owner or the actor.
    Offset(usize),
    /// Particle `i` of the source emitter snapshot.
    Particle(usize),
}

/// Per-chain bookkeeping.
#[derive(Clone, Debug, Default)]
struct Chain {
    key: Option<SourceKey>,
    head: Option<usize>,
    tail: Option<usize>,
    count: u32,
    spawn: SpawnPerUnitState,
    started: f32,
    source: Option<Vec3>,
}

/// Payload offsets of a trail emitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailOffsets {
    /// Trail payload.
    pub type_data: usize,
    /// Dynamic parameter values.
    pub dynamic_parameter: Option<usize>,
}

/// A trail emitter instance.
#[derive(Debug)]
pub struct TrailEmitter {
    pub(crate) core: EmitterCore,
    template: TrailTemplate,
    offsets: TrailOffsets,
    chains: Vec<Chain>,
    host: HostAnchors,
    particle_source: Option<SnapshotHandle>,
    pick_start: Option<usize>,
}

impl TrailEmitter {
    /// Attaches a trail emitter.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Layout`](crate::EffectError::Layout) if the
    /// payload layout is invalid.
    pub fn new(emitter: &EmitterTemplate, trail: &TrailTemplate, seed: EffectSeed) -> EffectResult<Self> {
        let mut allocator = PayloadAllocator::new().request(PayloadTag::TrailTypeData, TrailPayload::SIZE as isize);
        if emitter.dynamic_parameter.is_some() {
            allocator = allocator.request(PayloadTag::DynamicParameter, DynamicParameterModule::PAYLOAD_SIZE as isize);
        }
        let layout = allocator.allocate()?;
        let offsets = TrailOffsets {
            type_data: layout.offset_of(PayloadTag::TrailTypeData).unwrap_or(layout.header_size()),
            dynamic_parameter: layout.offset_of(PayloadTag::DynamicParameter),
        };

        let type_data = &trail.type_data;
        let capacity = type_data.capacity();
        let pool = ParticlePool::new(&layout, capacity)?;
        let dynamic = emitter
            .dynamic_parameter
            .clone()
            .zip(offsets.dynamic_parameter)
            .map(|(module, offset)| DynamicSlot { module, offset });
        let core = EmitterCore::new(
            emitter.name.clone(),
            emitter.required.clone(),
            pool,
            ParticleRng::new(seed),
            emitter.events.clone(),
            emitter.receivers.clone(),
            dynamic,
        );

        tracing::info!(
            "Trail emitter '{}' attached: {} trails x {} particles, stride {} bytes",
            emitter.name,
            type_data.max_trail_count(),
            type_data.max_particle_in_trail_count(),
            layout.stride()
        );

        Ok(Self {
            core,
            template: trail.clone(),
            offsets,
            chains: vec![Chain::default(); type_data.max_trail_count() as usize],
            host: HostAnchors::default(),
            particle_source: None,
            pick_start: None,
        })
    }

    /// Trail configuration.
    #[must_use]
    pub fn type_data(&self) -> &TrailTypeData {
        &self.template.type_data
    }

    /// Resolved payload offsets.
    #[must_use]
    pub fn offsets(&self) -> &TrailOffsets {
        &self.offsets
    }

    /// Live particle count over all chains.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.core.pool.active_count()
    }

    /// Chains holding at least one particle.
    pub fn trails(&self) -> impl Iterator<Item = TrailView<'_>> + '_ {
        (0..self.chains.len())
            .filter(|&i| self.chains[i].head.is_some())
            .map(move |index| TrailView { emitter: self, index })
    }

    /// Chain `index`, if it holds particles.
    #[must_use]
    pub fn trail(&self, index: usize) -> Option<TrailView<'_>> {
        self.chains
            .get(index)
            .filter(|c| c.head.is_some())
            .map(|_| TrailView { emitter: self, index })
    }

    /// Sets host per-trail offsets.
    pub fn set_host_anchors(&mut self, anchors: HostAnchors) {
        self.host = anchors;
    }

    pub(crate) fn bind_source(&mut self, emitter: &str, handle: &SnapshotHandle) {
        if self.template.source.source_emitter() == Some(emitter) {
            self.particle_source = Some(handle.clone());
        }
    }

    pub(crate) fn source_emitter(&self) -> Option<String> {
        self.template.source.source_emitter().map(str::to_string)
    }

    fn payload(&self, slot: usize) -> TrailPayload {
        self.core.pool.read(slot, self.offsets.type_data)
    }

    fn update_payload<R>(&mut self, slot: usize, f: impl FnOnce(&mut TrailPayload) -> R) -> R {
        self.core.pool.update(slot, self.offsets.type_data, f)
    }

    fn chain_of(&self, payload: &TrailPayload) -> Option<usize> {
        link(payload.trail_index).filter(|&i| i < self.chains.len())
    }

    /// Runs one frame.
    pub fn tick(&mut self, dt: f32, frame: &FrameContext<'_>) {
        if dt <= 0.0 {
            return;
        }
        self.core.clock.advance(&self.core.required, dt);

        self.kill_expired();

        let sources = self.resolve_sources(frame);
        let bound = self.bind(&sources);

        if let Some((timed, _)) = self.core.timed_spawn_count(dt) {
            for (index, position) in bound {
                self.spawn_into(index, position, timed);
            }
        }

        self.core.age(dt, true);
        self.update_geometry(frame);
    }

    fn kill_expired(&mut self) {
        for i in 0..self.core.pool.active_count() {
            let slot = self.core.pool.slot_at(i);
            if self.core.pool.header(slot).is_expired() && !self.payload(slot).chain_role().is_dead() {
                self.mark_dead(slot);
            }
        }
        self.sweep();
    }

    /// Unlinks `slot` and marks it `DeadTrail`.
    fn mark_dead(&mut self, slot: usize) {
        let payload = self.payload(slot);
        let chain = self.chain_of(&payload);
        match (link(payload.prev), link(payload.next)) {
            (None, None) => {
                if let Some(c) = chain {
                    self.chains[c].head = None;
                    self.chains[c].tail = None;
                }
            }
            (None, Some(next)) => {
                self.detach_prev(next);
                if let Some(c) = chain {
                    self.chains[c].head = Some(next);
                }
            }
            (Some(prev), None) => {
                self.detach_next(prev);
                if let Some(c) = chain {
                    self.chains[c].tail = Some(prev);
                }
            }
            (Some(prev), Some(next)) => {
                self.detach_next(prev);
                if let Some(c) = chain {
                    self.chains[c].tail = Some(prev);
                }
                self.force_kill_from(next);
            }
        }
        self.update_payload(slot, |p| p.set_role(ChainRole::DeadTrail));
    }

    /// `slot` loses its older neighbour and becomes the tail.
    fn detach_next(&mut self, slot: usize) {
        self.update_payload(slot, |p| {
            p.next = NULL_LINK;
            let role = if p.chain_role().is_head() { ChainRole::Only } else { ChainRole::End };
            p.set_role(role);
        });
    }

    /// `slot` loses its newer neighbour and becomes the head.
    fn detach_prev(&mut self, slot: usize) {
        self.update_payload(slot, |p| {
            p.prev = NULL_LINK;
            let role = match p.chain_role() {
                ChainRole::End | ChainRole::Only => ChainRole::Only,
                _ => ChainRole::Start,
            };
            p.set_role(role);
        });
    }

    fn force_kill_from(&mut self, slot: usize) {
        let mut cursor = Some(slot);
        let mut guard = self.core.pool.capacity();
        while let Some(s) = cursor {
            if guard == 0 {
                break;
            }
            guard -= 1;
            cursor = self.update_payload(s, |p| {
                p.set_role(ChainRole::ForceKill);
                link(p.next)
            });
        }
    }

    fn sweep(&mut self) {
        let mut i = self.core.pool.active_count();
        while i > 0 {
            i -= 1;
            let slot = self.core.pool.slot_at(i);
            let payload = self.payload(slot);
            if !payload.chain_role().is_dead() {
                continue;
            }
            if let Some(c) = self.chain_of(&payload) {
                self.chains[c].count = self.chains[c].count.saturating_sub(1);
            }
            self.core.emit_death(slot);
            self.core.pool.kill_at(i);
        }
    }

    /// Kills every particle of chain `index`.
    fn kill_chain(&mut self, index: usize) {
        let mut cursor = self.chains[index].head;
        let mut guard = self.core.pool.capacity();
        while let Some(slot) = cursor {
            if guard == 0 {
                break;
            }
            guard -= 1;
            cursor = link(self.payload(slot).next);
            self.core.emit_death(slot);
            self.core.pool.kill_slot(slot);
        }
        let chain = &mut self.chains[index];
        chain.head = None;
        chain.tail = None;
        chain.count = 0;
    }

    fn kill_tail(&mut self, index: usize) {
        let Some(tail) = self.chains[index].tail else {
            return;
        };
        let prev = link(self.payload(tail).prev);
        if let Some(prev) = prev {
            self.detach_next(prev);
        }
        let chain = &mut self.chains[index];
        chain.tail = prev;
        if prev.is_none() {
            chain.head = None;
        }
        chain.count = chain.count.saturating_sub(1);
        self.core.emit_death(tail);
        self.core.pool.kill_slot(tail);
    }

    pub(crate) fn kill_all(&mut self) {
        for i in 0..self.core.pool.active_count() {
            let slot = self.core.pool.slot_at(i);
            self.core.emit_death(slot);
        }
        tracing::debug!("Trail emitter '{}' killed {} particles", self.core.name, self.core.pool.active_count());
        self.core.pool.clear();
        for chain in &mut self.chains {
            chain.head = None;
            chain.tail = None;
            chain.count = 0;
        }
    }

    fn offset(&self, i: usize) -> Vec3 {
        resolve_offset(&self.host.offsets, &self.template.source.offsets, i)
    }

    fn offset_count(&self) -> usize {
        self.host.offsets.len().max(self.template.source.offsets.len()).clamp(1, self.chains.len())
    }

    fn last_source(&self, key: SourceKey) -> Option<Vec3> {
        self.chains.iter().find(|c| c.key == Some(key)).and_then(|c| c.source)
    }

    /// World positions of this frame's trail sources.
    fn resolve_sources(&mut self, frame: &FrameContext<'_>) -> Vec<(SourceKey, Vec3)> {
        let method = self.template.source.method.clone();
        match method {
            TrailSourceMethod::Emitter => (0..self.offset_count())
                .map(|i| (SourceKey::Offset(i), frame.transform.transform_point(self.offset(i))))
                .collect(),
            TrailSourceMethod::Actor { name } => {
                let actor = frame.parameters.actor(&name);
                if actor.is_none() {
                    self.note_actor_miss();
                }
                (0..self.offset_count())
                    .map(|i| {
                        let key = SourceKey::Offset(i);
                        let offset = self.offset(i);
                        let position = match actor {
                            Some(actor) => actor.location + actor.rotation.rotate(offset),
                            None => self
                                .last_source(key)
                                .unwrap_or_else(|| frame.transform.transform_point(offset)),
                        };
                        (key, position)
                    })
                    .collect()
            }
            TrailSourceMethod::Particle { selection, .. } => {
                let locations = self
                    .particle_source
                    .as_ref()
                    .and_then(|h| h.read(|s| s.particles.iter().map(|p| p.location).collect::<Vec<_>>()))
                    .unwrap_or_default();
                if locations.is_empty() {
                    self.core.diagnostics.record(RuntimeFault::UnresolvedParticle);
                    return Vec::new();
                }
                let n = locations.len();
                let start = *self.pick_start.get_or_insert_with(|| match selection {
                    ParticleSelection::Sequential => 0,
                    ParticleSelection::Random => self.core.rng.index(n),
                });
                (0..n.min(self.chains.len()))
                    .map(|i| {
                        let j = (start + i) % n;
                        (SourceKey::Particle(j), locations[j])
                    })
                    .collect()
            }
        }
    }

    fn note_actor_miss(&mut self) {
        let head = self.chains.iter().find_map(|c| c.head);
        match head {
            Some(slot) => {
                let missed = Refreshed { missed: true, ..Refreshed::default() };
                self.core.note_resolve(AnchorSide::Source, &missed, slot);
            }
            None => self.core.diagnostics.record(RuntimeFault::ResolveMiss),
        }
    }

    /// Assigns a chain to every source, rolling the oldest chain when all
    /// are taken. Returns `(chain, position)` pairs.
    fn bind(&mut self, sources: &[(SourceKey, Vec3)]) -> Vec<(usize, Vec3)> {
        let keys: Vec<SourceKey> = sources.iter().map(|&(key, _)| key).collect();
        for chain in &mut self.chains {
            let vanished = chain.key.is_some_and(|k| !keys.contains(&k));
            if vanished && chain.count == 0 {
                chain.key = None;
                chain.spawn = SpawnPerUnitState::default();
            }
        }

        let now = self.core.clock.seconds_since_creation;
        let mut bound = Vec::with_capacity(sources.len());
        for &(key, position) in sources {
            let index = match self.chains.iter().position(|c| c.key == Some(key)) {
                Some(index) => index,
                None => {
                    let index = match self.chains.iter().position(|c| c.key.is_none()) {
                        Some(index) => index,
                        None => self.roll_oldest(&keys),
                    };
                    let chain = &mut self.chains[index];
                    chain.key = Some(key);
                    chain.spawn = SpawnPerUnitState::default();
                    chain.started = now;
                    index
                }
            };
            self.chains[index].source = Some(position);
            bound.push((index, position));
        }
        bound
    }

    fn roll_oldest(&mut self, keys: &[SourceKey]) -> usize {
        let oldest = self
            .chains
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key.map_or(true, |k| !keys.contains(&k)))
            .min_by(|(_, a), (_, b)| a.started.total_cmp(&b.started))
            .map_or(0, |(i, _)| i);
        self.kill_chain(oldest);
        self.core.diagnostics.record(RuntimeFault::CapacityExhausted);
        tracing::debug!("Trail emitter '{}' rolled trail {}", self.core.name, oldest);
        oldest
    }

    fn spawn_into(&mut self, index: usize, position: Vec3, timed: u32) {
        let mut spawned = 0;
        if let Some(spu) = self.template.spawn_per_unit.as_ref() {
            let unit = spu.advance(&mut self.chains[index].spawn, position);
            for i in 0..unit.count {
                self.spawn_particle(index, unit.location(i), None);
            }
            spawned += unit.count;
        }
        for _ in 0..timed {
            self.spawn_particle(index, position, None);
        }
        spawned += timed;
        if spawned == 0 && self.chains[index].count == 0 {
            self.spawn_particle(index, position, None);
        }
    }

    pub(crate) fn spawn_from_event(&mut self, count: u32, location: Vec3, velocity: Vec3, _frame: &FrameContext<'_>) {
        let max = self.template.type_data.max_particle_in_trail_count();
        for _ in 0..count.min(max) {
            self.spawn_particle(0, location, Some(velocity));
        }
    }

    /// Links a new particle as the head of chain `index`.
    fn spawn_particle(&mut self, index: usize, location: Vec3, velocity: Option<Vec3>) {
        if self.chains[index].count >= self.template.type_data.max_particle_in_trail_count() {
            self.kill_tail(index);
        }
        let Some(slot) = self.core.pool.spawn() else {
            self.core.diagnostics.record(RuntimeFault::CapacityExhausted);
            return;
        };
        let header = self.core.new_header(location, velocity);
        self.core.pool.set_header(slot, &header);

        let old_head = self.chains[index].head;
        let mut payload = TrailPayload {
            next: to_link(old_head),
            trail_index: to_link(Some(index)),
            spawn_time: self.core.clock.seconds_since_creation,
            ..TrailPayload::default()
        };
        payload.set_role(if old_head.is_some() { ChainRole::Start } else { ChainRole::Only });
        self.core.pool.write(slot, self.offsets.type_data, &payload);

        if let Some(old) = old_head {
            self.update_payload(old, |p| {
                p.prev = to_link(Some(slot));
                let role = if p.chain_role() == ChainRole::Only { ChainRole::End } else { ChainRole::Middle };
                p.set_role(role);
            });
        }

        let chain = &mut self.chains[index];
        chain.head = Some(slot);
        if chain.tail.is_none() {
            chain.tail = Some(slot);
        }
        chain.count += 1;

        self.core.spawn_dynamic(slot, 0.0);
        self.core.emit_spawn(slot);
    }

    /// Per-segment tessellation, triangle counts and tangents.
    fn update_geometry(&mut self, frame: &FrameContext<'_>) {
        let forward = frame.transform.forward_axis();
        for index in 0..self.chains.len() {
            let mut cursor = self.chains[index].head;
            let mut remaining = self.chains[index].count;
            while let Some(slot) = cursor {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
                let payload = self.payload(slot);
                let header = self.core.pool.header(slot);
                let next = link(payload.next);
                let prev = link(payload.prev);

                let (tessellation, tangent) = match next {
                    Some(next) => {
                        let older = self.core.pool.header(next).location;
                        let segment = header.location - older;
                        (self.template.type_data.tessellation_for(segment.length()), segment.try_normalize())
                    }
                    None => (0, prev.and_then(|p| (self.core.pool.header(p).location - header.location).try_normalize())),
                };
                let tangent = tangent.or_else(|| header.velocity.try_normalize()).unwrap_or(forward);
                self.update_payload(slot, |p| {
                    p.tessellation = tessellation as i32;
                    p.triangle_count = tessellation as i32 * 2;
                    p.tangent = tangent;
                });
                self.core.update_dynamic(slot, header.relative_time, header.velocity);
                cursor = next;
            }
        }
    }
}

/// One particle of a chain, head first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    /// Location.
    pub location: Vec3,
    /// Location at the previous tick.
    pub old_location: Vec3,
    /// Size.
    pub size: Vec3,
    /// Rotation in radians.
    pub rotation: f32,
    /// Color.
    pub color: LinearColor,
    /// Unit chain direction, pointing toward the head.
    pub tangent: Vec3,
    /// Subdivisions toward the next particle, 0 at the tail.
    pub tessellation: u32,
    /// Chain role.
    pub role: ChainRole,
    /// Dynamic parameter values.
    pub dynamic: [f32; 4],
}

/// Read access to one chain.
#[derive(Clone, Copy, Debug)]
pub struct TrailView<'a> {
    emitter: &'a TrailEmitter,
    index: usize,
}

impl<'a> TrailView<'a> {
    /// Chain index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current source position, if the chain is bound.
    #[must_use]
    pub fn source(&self) -> Option<Vec3> {
        self.emitter.chains[self.index].source
    }

    /// Particles in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emitter.chains[self.index].count as usize
    }

    /// True for a chain with no particle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pool slot of the head.
    #[must_use]
    pub fn head(&self) -> Option<usize> {
        self.emitter.chains[self.index].head
    }

    /// Pool slots from head to tail. Stops after `len` steps.
    #[must_use]
    pub fn slots(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head();
        while let Some(slot) = cursor {
            if out.len() >= self.len() {
                break;
            }
            out.push(slot);
            cursor = link(self.emitter.payload(slot).next);
        }
        out
    }

    /// Particles from head to tail.
    #[must_use]
    pub fn points(&self) -> Vec<TrailPoint> {
        self.slots()
            .into_iter()
            .map(|slot| {
                let header: BaseParticle = self.emitter.core.pool.header(slot);
                let payload = self.emitter.payload(slot);
                TrailPoint {
                    location: header.location,
                    old_location: header.old_location,
                    size: header.size,
                    rotation: header.rotation,
                    color: header.color,
                    tangent: payload.tangent,
                    tessellation: payload.tessellation.max(0) as u32,
                    role: payload.chain_role(),
                    dynamic: self.emitter.core.dynamic_values(slot),
                }
            })
            .collect()
    }

    /// Sum of per-segment triangles.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.slots()
            .into_iter()
            .map(|slot| self.emitter.payload(slot).triangle_count.max(0) as u32)
            .sum()
    }

    /// Taper at normalized chain position `u` (0 head, 1 tail).
    #[must_use]
    pub fn taper(&self, u: f32) -> f32 {
        self.emitter.template.type_data.taper_factor.evaluate(u.clamp(0.0, 1.0))
    }

    /// Payload of a chain member.
    #[must_use]
    pub fn payload(&self, slot: usize) -> TrailPayload {
        self.emitter.payload(slot)
    }
}

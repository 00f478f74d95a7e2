//! # Effect System
//!
//! Owns the emitters of one effect instance and drives the frame:
//!
//! 1. Tick every emitter in template order
//! 2. Publish each emitter's snapshot right after its tick, so later
//!    emitters read this frame's particles
//! 3. Dispatch queued events to receivers, then mirror them to the host
//!
//! Receivers only see events after every producer has finished, and
//! particles they spawn queue their own events for the next frame.

use filament_core::SnapshotPublisher;
use filament_shared::{AnchorSide, ParticleEvent, Transform, Vec3};

use crate::beam::BeamEmitter;
use crate::bus::{EventBus, EventStream};
use crate::config::{EffectTemplate, EmitterKind};
use crate::emitter::{Emitter, FrameContext};
use crate::error::{EffectError, EffectResult};
use crate::modules::HostAnchors;
use crate::params::ParameterHandle;
use crate::random::EffectSeed;
use crate::trail::TrailEmitter;

/// A running effect attached to an owner component.
#[derive(Debug)]
pub struct EffectSystem {
    name: String,
    emitters: Vec<Emitter>,
    publishers: Vec<SnapshotPublisher>,
    transform: Transform,
    parameters: ParameterHandle,
    bus: EventBus,
    queued: Vec<ParticleEvent>,
    attached: bool,
}

impl EffectSystem {
    /// Attaches every emitter of `template`.
    ///
    /// `seed` overrides the template seed. Each emitter derives its own
    /// stream from the seed and its position.
    ///
    /// # Errors
    ///
    /// Returns any validation error of the template, and
    /// [`EffectError::Layout`] if an emitter's payload layout is invalid.
    pub fn new(template: &EffectTemplate, parameters: ParameterHandle, seed: Option<EffectSeed>) -> EffectResult<Self> {
        let mut template = template.clone();
        template.validate()?;
        let seed = seed.or(template.seed.map(EffectSeed::new)).unwrap_or_default();

        let mut emitters = Vec::with_capacity(template.emitters.len());
        for (i, emitter) in template.emitters.iter().enumerate() {
            let stream = seed.derive(i as u64);
            let instance = match &emitter.kind {
                EmitterKind::Beam(beam) => Emitter::Beam(BeamEmitter::new(emitter, beam, stream)?),
                EmitterKind::Trail(trail) => Emitter::Trail(TrailEmitter::new(emitter, trail, stream)?),
            };
            emitters.push(instance);
        }

        let publishers: Vec<SnapshotPublisher> = emitters.iter().map(|_| SnapshotPublisher::new()).collect();
        for i in 0..emitters.len() {
            for source in emitters[i].source_emitters() {
                if let Some(j) = emitters.iter().position(|e| e.name() == source) {
                    let handle = publishers[j].handle();
                    emitters[i].bind_source(&source, &handle);
                }
            }
        }

        tracing::info!("Effect '{}' attached with {} emitters (seed {})", template.name, emitters.len(), seed.0);

        Ok(Self {
            name: template.name,
            emitters,
            publishers,
            transform: Transform::IDENTITY,
            parameters,
            bus: EventBus::default(),
            queued: Vec::new(),
            attached: true,
        })
    }

    /// Effect name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the owner's local-to-world transform.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// Owner's local-to-world transform.
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Emitters in tick order.
    #[must_use]
    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    /// Emitter by name.
    #[must_use]
    pub fn emitter(&self, name: &str) -> Option<&Emitter> {
        self.emitters.iter().find(|e| e.name() == name)
    }

    fn index_of(&self, name: &str) -> EffectResult<usize> {
        self.emitters
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| EffectError::UnknownEmitter(name.to_string()))
    }

    /// A host handle on the event stream.
    #[must_use]
    pub fn event_stream(&self) -> EventStream {
        self.bus.stream()
    }

    /// Events dropped because the host stream was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped()
    }

    /// True until [`EffectSystem::detach`] is called.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Runs one frame. `dt <= 0` changes nothing.
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let frame = FrameContext { transform: &self.transform, parameters: &self.parameters };
        for (emitter, publisher) in self.emitters.iter_mut().zip(&self.publishers) {
            emitter.tick(dt, &frame);
            publisher.publish(frame.transform.origin(), emitter.core().snapshot_particles());
        }
        dispatch(&mut self.emitters, &self.bus, &mut self.queued, &frame);
    }

    /// Reports a host-detected collision of the `particle`-th live particle
    /// of `emitter`. Matching generators queue events for the next dispatch.
    ///
    /// Returns `false` if no particle lives at that index.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::UnknownEmitter`] for an unknown name.
    pub fn report_collision(
        &mut self,
        emitter: &str,
        particle: usize,
        normal: Vec3,
        hit_time: f32,
        item: i32,
    ) -> EffectResult<bool> {
        let index = self.index_of(emitter)?;
        Ok(self.emitters[index].core_mut().report_collision(particle, normal, hit_time, item))
    }

    /// Sets host anchor arrays of one emitter side.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::UnknownEmitter`] for an unknown name.
    pub fn set_host_anchors(&mut self, emitter: &str, side: AnchorSide, anchors: HostAnchors) -> EffectResult<()> {
        let index = self.index_of(emitter)?;
        self.emitters[index].set_host_anchors(side, anchors);
        Ok(())
    }

    /// Kills every particle of `emitter`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::UnknownEmitter`] for an unknown name.
    pub fn kill_all(&mut self, emitter: &str) -> EffectResult<()> {
        let index = self.index_of(emitter)?;
        self.emitters[index].kill_all();
        Ok(())
    }

    /// Drops every emitter and snapshot. Handles held elsewhere go dead.
    pub fn detach(&mut self) {
        tracing::info!("Effect '{}' detached: {} emitters released", self.name, self.emitters.len());
        self.emitters.clear();
        self.publishers.clear();
        self.queued.clear();
        self.attached = false;
    }
}

/// Delivers every queued event to every receiver, then to the host.
fn dispatch(emitters: &mut [Emitter], bus: &EventBus, queued: &mut Vec<ParticleEvent>, frame: &FrameContext<'_>) {
    for emitter in emitters.iter_mut() {
        emitter.core_mut().drain_events(queued);
    }
    for event in queued.drain(..) {
        let location = event.record().location;
        for emitter in emitters.iter_mut() {
            for outcome in emitter.core_mut().receive(&event) {
                emitter.apply(outcome, location, frame);
            }
        }
        bus.publish(event);
    }
    for emitter in emitters.iter_mut() {
        emitter.core_mut().settle_spawned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BeamTemplate, EmitterTemplate, TrailTemplate};
    use crate::modules::{AnchorModule, EventGenerator, EventReceiver, ReceiverAction};
    use crate::params::ParameterTable;
    use filament_shared::EventKind;

    fn beam_effect() -> EffectTemplate {
        let beam = BeamTemplate {
            source: Some(AnchorModule::fixed(Vec3::ZERO)),
            target: Some(AnchorModule::fixed(Vec3::new(100.0, 0.0, 0.0))),
            ..BeamTemplate::default()
        };
        let mut emitter = EmitterTemplate::beam("bolt", beam);
        emitter.events.push(EventGenerator::new(EventKind::Spawn, "Born"));
        EffectTemplate::new("test", vec![emitter])
    }

    #[test]
    fn test_tick_publishes_events() {
        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&beam_effect(), table.handle(), Some(EffectSeed::new(1))).unwrap();
        let stream = system.event_stream();
        system.tick(0.1);
        assert_eq!(system.emitter("bolt").map(Emitter::active_count), Some(1));
        let events = stream.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "Born");
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&beam_effect(), table.handle(), None).unwrap();
        system.tick(0.0);
        assert_eq!(system.emitter("bolt").map(Emitter::active_count), Some(0));
    }

    #[test]
    fn test_receiver_kills_other_emitter() {
        let mut effect = beam_effect();
        let mut trail = EmitterTemplate::trail("ribbon", TrailTemplate::default());
        trail.receivers.push(EventReceiver {
            kind: EventKind::Spawn,
            name: Some("Born".into()),
            fire_every: 1,
            action: ReceiverAction::KillAll { stop_spawning: true },
        });
        effect.emitters.push(trail);

        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&effect, table.handle(), None).unwrap();
        system.tick(0.1);
        let ribbon = system.emitter("ribbon").unwrap();
        assert_eq!(ribbon.active_count(), 0);
        assert!(ribbon.is_spawning_halted());
    }

    #[test]
    fn test_receiver_spawns_age_with_the_rest() {
        let mut effect = beam_effect();
        let mut trail = EmitterTemplate::trail("ribbon", TrailTemplate::default());
        trail.required.particle_lifetime = crate::distribution::FloatDistribution::constant(4.0);
        trail.receivers.push(EventReceiver {
            kind: EventKind::Spawn,
            name: Some("Born".into()),
            fire_every: 1,
            action: ReceiverAction::Spawn {
                count: crate::distribution::FloatDistribution::constant(1.0),
                use_particle_time: false,
                inherit_velocity: false,
                inherit_velocity_scale: 1.0,
            },
        });
        effect.emitters.push(trail);

        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&effect, table.handle(), None).unwrap();
        system.tick(0.5);
        system.tick(0.5);

        // One particle from the tick, one from the receiver, both aged once.
        let particles = system.emitter("ribbon").map(Emitter::particles).unwrap();
        assert_eq!(particles.len(), 2);
        for p in &particles {
            assert!((p.relative_time - 0.125).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unknown_emitter() {
        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&beam_effect(), table.handle(), None).unwrap();
        assert_eq!(
            system.report_collision("nope", 0, Vec3::Z, 0.0, -1),
            Err(EffectError::UnknownEmitter("nope".into()))
        );
        assert_eq!(system.report_collision("bolt", 0, Vec3::Z, 0.0, -1), Ok(false));
    }

    #[test]
    fn test_detach_kills_snapshot_handles() {
        let mut effect = beam_effect();
        effect.emitters.push(EmitterTemplate::trail("ribbon", TrailTemplate::default()));
        let table = ParameterTable::new();
        let mut system = EffectSystem::new(&effect, table.handle(), None).unwrap();
        system.tick(0.1);
        system.detach();
        assert!(system.emitters().is_empty());
        assert!(!system.is_attached());
    }
}

//! # Effect Templates
//!
//! Read-only emitter configuration, loaded from TOML once and shared by
//! every instance. Every module section is optional and sparse.
//!
//! ```toml
//! name = "lightning"
//! seed = 7
//!
//! [[emitters]]
//! name = "bolt"
//! required = { spawn_rate = { type = "constant", value = 2.0 } }
//!
//! [emitters.kind]
//! type = "beam"
//! type_data = { speed = 50.0, interpolation_points = 4 }
//! source = { method = { type = "emitter" } }
//! target = { method = { type = "actor", name = "Target" } }
//! ```

use std::collections::HashSet;
use std::path::Path;

use filament_shared::{MAX_BEAMS, MAX_INTERPOLATION_POINTS, MAX_NOISE_FREQUENCY, MAX_SHEETS, MAX_TESSELLATION, MAX_TRAILS};
use serde::{Deserialize, Serialize};

use crate::beam::BeamTypeData;
use crate::error::{EffectError, EffectResult};
use crate::modules::{
    AnchorModifier, AnchorModule, DynamicParameterModule, EventGenerator, EventReceiver, NoiseModule, RequiredModule,
    SpawnPerUnit,
};
use crate::trail::{TrailSource, TrailTypeData};

/// Beam emitter modules.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamTemplate {
    /// Beam type data.
    pub type_data: BeamTypeData,
    /// Source resolver. The owner origin when absent.
    pub source: Option<AnchorModule>,
    /// Target resolver. Ignored by the distance method.
    pub target: Option<AnchorModule>,
    /// Source modifier.
    pub source_modifier: Option<AnchorModifier>,
    /// Target modifier.
    pub target_modifier: Option<AnchorModifier>,
    /// Noise generator.
    pub noise: Option<NoiseModule>,
}

/// Trail emitter modules.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailTemplate {
    /// Trail type data.
    pub type_data: TrailTypeData,
    /// Trail source.
    pub source: TrailSource,
    /// Distance-driven spawning.
    pub spawn_per_unit: Option<SpawnPerUnit>,
}

/// Engine of an emitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterKind {
    /// Beam engine.
    Beam(BeamTemplate),
    /// Trail engine.
    Trail(TrailTemplate),
}

impl EmitterKind {
    /// Emitters whose snapshots this engine reads.
    #[must_use]
    pub fn source_emitters(&self) -> Vec<&str> {
        match self {
            Self::Beam(beam) => [beam.source.as_ref(), beam.target.as_ref()]
                .into_iter()
                .flatten()
                .filter_map(AnchorModule::source_emitter)
                .collect(),
            Self::Trail(trail) => trail.source.source_emitter().into_iter().collect(),
        }
    }
}

/// One emitter of an effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmitterTemplate {
    /// Unique name within the effect.
    pub name: String,
    /// Spawn, loop and initial-state settings.
    #[serde(default)]
    pub required: RequiredModule,
    /// Engine and its modules.
    pub kind: EmitterKind,
    /// Event generators.
    #[serde(default)]
    pub events: Vec<EventGenerator>,
    /// Event receivers.
    #[serde(default)]
    pub receivers: Vec<EventReceiver>,
    /// Dynamic parameter outputs.
    #[serde(default)]
    pub dynamic_parameter: Option<DynamicParameterModule>,
}

impl EmitterTemplate {
    /// A beam emitter with default settings.
    #[must_use]
    pub fn beam(name: impl Into<String>, beam: BeamTemplate) -> Self {
        Self::with_kind(name, EmitterKind::Beam(beam))
    }

    /// A trail emitter with default settings.
    #[must_use]
    pub fn trail(name: impl Into<String>, trail: TrailTemplate) -> Self {
        Self::with_kind(name, EmitterKind::Trail(trail))
    }

    fn with_kind(name: impl Into<String>, kind: EmitterKind) -> Self {
        Self {
            name: name.into(),
            required: RequiredModule::default(),
            kind,
            events: Vec::new(),
            receivers: Vec::new(),
            dynamic_parameter: None,
        }
    }

    /// Clamps counts to the compile-time caps, warning on each change.
    fn clamp_caps(&mut self) {
        let name = self.name.clone();
        let clamp = |field: &str, value: &mut u32, min: u32, max: u32| {
            let clamped = (*value).clamp(min, max);
            if clamped != *value {
                tracing::warn!("Emitter '{}': {} {} clamped to {}", name, field, value, clamped);
                *value = clamped;
            }
        };

        match &mut self.kind {
            EmitterKind::Beam(beam) => {
                let td = &mut beam.type_data;
                clamp("interpolation_points", &mut td.interpolation_points, 0, MAX_INTERPOLATION_POINTS);
                clamp("sheets", &mut td.sheets, 1, MAX_SHEETS);
                clamp("max_beam_count", &mut td.max_beam_count, 1, MAX_BEAMS);
                if let Some(noise) = &beam.noise {
                    if noise.frequency > MAX_NOISE_FREQUENCY {
                        tracing::warn!(
                            "Emitter '{}': noise frequency {} exceeds {}, clamped at attach",
                            name,
                            noise.frequency,
                            MAX_NOISE_FREQUENCY
                        );
                    }
                }
            }
            EmitterKind::Trail(trail) => {
                let td = &mut trail.type_data;
                clamp("max_trail_count", &mut td.max_trail_count, 1, MAX_TRAILS);
                clamp("sheets_per_trail", &mut td.sheets_per_trail, 1, MAX_SHEETS);
                clamp("max_tessellation_between_particles", &mut td.max_tessellation_between_particles, 1, MAX_TESSELLATION);
                clamp("max_particle_in_trail_count", &mut td.max_particle_in_trail_count, 1, u32::MAX);
            }
        }
        for receiver in &mut self.receivers {
            clamp("fire_every", &mut receiver.fire_every, 1, u32::MAX);
        }
    }
}

/// A complete effect: emitters in tick order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    /// Effect name.
    #[serde(default)]
    pub name: String,
    /// Seed for deterministic playback.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Emitters, ticked in this order.
    #[serde(default)]
    pub emitters: Vec<EmitterTemplate>,
}

impl EffectTemplate {
    /// An effect made of `emitters`.
    #[must_use]
    pub fn new(name: impl Into<String>, emitters: Vec<EmitterTemplate>) -> Self {
        Self { name: name.into(), seed: None, emitters }
    }

    /// Parses and validates a TOML template.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::InvalidConfig`] on a parse failure, and any
    /// error of [`EffectTemplate::validate`].
    pub fn from_toml_str(text: &str) -> EffectResult<Self> {
        let mut template: Self = toml::from_str(text).map_err(|e| EffectError::InvalidConfig(e.to_string()))?;
        template.validate()?;
        tracing::info!("Loaded effect template '{}' with {} emitters", template.name, template.emitters.len());
        Ok(template)
    }

    /// Reads, parses and validates a TOML template file.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::TemplateIo`] if the file cannot be read, and
    /// any error of [`EffectTemplate::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> EffectResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EffectError::TemplateIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks names and source references, then clamps counts to the caps.
    ///
    /// # Errors
    ///
    /// - [`EffectError::InvalidConfig`] for an empty emitter name
    /// - [`EffectError::DuplicateEmitter`] when two emitters share a name
    /// - [`EffectError::SelfReference`] when an emitter reads its own particles
    /// - [`EffectError::UnknownEmitter`] when a source emitter does not exist
    pub fn validate(&mut self) -> EffectResult<()> {
        let mut names = HashSet::new();
        for emitter in &self.emitters {
            if emitter.name.is_empty() {
                return Err(EffectError::InvalidConfig("emitter name is empty".to_string()));
            }
            if !names.insert(emitter.name.as_str()) {
                return Err(EffectError::DuplicateEmitter(emitter.name.clone()));
            }
        }

        for emitter in &self.emitters {
            for source in emitter.kind.source_emitters() {
                if source == emitter.name {
                    return Err(EffectError::SelfReference(emitter.name.clone()));
                }
                if !names.contains(source) {
                    return Err(EffectError::UnknownEmitter(source.to_string()));
                }
            }
        }

        for emitter in &mut self.emitters {
            emitter.clamp_caps();
        }
        Ok(())
    }
}

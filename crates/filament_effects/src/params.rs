//! Named-parameter tables.
//!
//! The owner component keeps the strong [`ParameterTable`]; emitters only
//! hold a [`ParameterHandle`]. Resolvers look names up through the handle
//! every frame, so a removed actor turns into a miss instead of a dangling
//! reference.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use filament_shared::{LinearColor, Quaternion, Vec3};
use parking_lot::RwLock;

/// World placement of a named actor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActorState {
    /// World location.
    pub location: Vec3,
    /// World rotation.
    pub rotation: Quaternion,
}

impl ActorState {
    /// Creates an actor placement.
    #[must_use]
    pub const fn new(location: Vec3, rotation: Quaternion) -> Self {
        Self { location, rotation }
    }

    /// Unit forward (X) axis.
    #[must_use]
    pub fn forward_axis(&self) -> Vec3 {
        self.rotation.rotate(Vec3::X).try_normalize().unwrap_or(Vec3::X)
    }
}

/// A value stored under a parameter name.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    /// An actor reference.
    Actor(ActorState),
    /// A color.
    Color(LinearColor),
    /// A vector.
    Vector(Vec3),
    /// A scalar.
    Float(f32),
    /// A material, by asset name.
    Material(String),
}

type Table = HashMap<String, ParameterValue>;

/// Owning parameter table of a component.
///
/// Cloning shares the same table.
#[derive(Clone, Debug, Default)]
pub struct ParameterTable {
    inner: Arc<RwLock<Table>>,
}

impl ParameterTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value.
    pub fn set(&self, name: impl Into<String>, value: ParameterValue) {
        self.inner.write().insert(name.into(), value);
    }

    /// Shorthand for an actor entry.
    pub fn set_actor(&self, name: impl Into<String>, actor: ActorState) {
        self.set(name, ParameterValue::Actor(actor));
    }

    /// Removes a value.
    pub fn remove(&self, name: &str) -> Option<ParameterValue> {
        self.inner.write().remove(name)
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.inner.read().get(name).cloned()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Weak handle for emitters.
    #[must_use]
    pub fn handle(&self) -> ParameterHandle {
        ParameterHandle { inner: Arc::downgrade(&self.inner) }
    }
}

/// Non-owning view of a [`ParameterTable`].
#[derive(Clone, Debug, Default)]
pub struct ParameterHandle {
    inner: Weak<RwLock<Table>>,
}

impl ParameterHandle {
    /// A handle that never resolves.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// True while the owning table is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        let table = self.inner.upgrade()?;
        let guard = table.read();
        guard.get(name).cloned()
    }

    /// Looks up an actor by name.
    #[must_use]
    pub fn actor(&self, name: &str) -> Option<ActorState> {
        match self.get(name)? {
            ParameterValue::Actor(actor) => Some(actor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_lookup() {
        let table = ParameterTable::new();
        let handle = table.handle();
        table.set_actor("Turret", ActorState::new(Vec3::new(5.0, 0.0, 0.0), Quaternion::IDENTITY));

        let actor = handle.actor("Turret").unwrap();
        assert_eq!(actor.location, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(actor.forward_axis(), Vec3::X);
        assert!(handle.actor("Missing").is_none());
    }

    #[test]
    fn test_non_actor_is_not_an_actor() {
        let table = ParameterTable::new();
        table.set("Glow", ParameterValue::Float(2.0));
        assert!(table.handle().actor("Glow").is_none());
        assert_eq!(table.get("Glow"), Some(ParameterValue::Float(2.0)));
    }

    #[test]
    fn test_handle_outlived_by_table() {
        let table = ParameterTable::new();
        table.set_actor("A", ActorState::default());
        let handle = table.handle();
        drop(table);
        assert!(!handle.is_alive());
        assert!(handle.actor("A").is_none());
        assert!(!ParameterHandle::detached().is_alive());
    }
}

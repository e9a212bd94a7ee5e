//! Entity implementation

use super::component::{Component, ComponentStore};
use std::fmt;
use uuid::Uuid;

/// Globally unique entity identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its hyphenated string form
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(text).map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// An entity that is not (or no longer) registered in a world.
///
/// Entities are moved into a [`World`](super::World) when added and moved back
/// out when removed, so a value can only ever live in one registry.
#[derive(Debug, Default)]
pub struct Entity {
    id: Option<EntityId>,
    components: ComponentStore,
}

impl Entity {
    /// Create an entity with a pre-set identifier
    pub fn new() -> Self {
        Self {
            id: Some(EntityId::generate()),
            components: ComponentStore::new(),
        }
    }

    /// Create an entity with an explicit identifier
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            components: ComponentStore::new(),
        }
    }

    /// Create an entity without an identifier; the world assigns one on add
    pub fn unassigned() -> Self {
        Self::default()
    }

    /// Attach a component (builder pattern)
    pub fn with<T: Component>(mut self, component: T) -> Self {
        self.components.insert(component);
        self
    }

    /// The identifier, if one has been assigned
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Components carried by this entity
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Mutable access to the carried components
    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub(crate) fn into_parts(self) -> (Option<EntityId>, ComponentStore) {
        (self.id, self.components)
    }

    pub(crate) fn from_parts(id: EntityId, components: ComponentStore) -> Self {
        Self {
            id: Some(id),
            components,
        }
    }
}

//! ECS World implementation
//!
//! The world is the entity registry: it owns every registered entity's
//! component store and hosts the aspects that filter them. Every mutation
//! entry point updates the attached aspects incrementally and emits their
//! notifications synchronously before returning.

use super::aspect::{Aspect, AspectEvent, AspectId, AspectListener, AspectSpec, ListenerId};
use super::component::{Component, ComponentSet, ComponentStore, ComponentType, StoredComponent};
use super::entity::{Entity, EntityId};
use indexmap::IndexMap;
use slotmap::SlotMap;
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// An operation referenced an entity that is not registered
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// An entity lacks a component that was required
    #[error("Entity {entity} has no {component} component")]
    MissingComponent {
        /// The entity that was inspected
        entity: EntityId,
        /// Name of the missing component type
        component: &'static str,
    },

    /// An entity with the same id is already registered
    #[error("Entity already registered: {0}")]
    DuplicateEntity(EntityId),

    /// The aspect handle is unknown or no longer attached
    #[error("Unknown or detached aspect")]
    UnknownAspect,

    /// The aspect belongs to a system and is released by removing that system
    #[error("Aspect is owned by a system")]
    AspectOwned,
}

/// Where a component event sits relative to the membership update
#[derive(Clone, Copy, PartialEq, Eq)]
enum Notify {
    /// Members are told before membership is recomputed (removal, clear, sort)
    BeforeTransition,
    /// Members are told after membership is recomputed (addition)
    AfterTransition,
}

/// ECS World containing all entities and components
#[derive(Debug, Default)]
pub struct World {
    entities: IndexMap<EntityId, ComponentStore>,
    aspects: SlotMap<AspectId, Aspect>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------------

    /// Create a new, empty entity
    pub fn spawn(&mut self) -> EntityId {
        self.spawn_with(ComponentSet::new())
    }

    /// Create a new entity carrying the given components
    pub fn spawn_with(&mut self, components: ComponentSet) -> EntityId {
        let mut id = EntityId::generate();
        while self.entities.contains_key(&id) {
            id = EntityId::generate();
        }
        let mut store = ComponentStore::new();
        for component in components.into_inner() {
            store.insert_stored(component);
        }
        self.insert_validated(vec![(id, store)]);
        id
    }

    /// Register one entity, assigning an id if it has none
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        let (id, components) = entity.into_parts();
        let id = id.unwrap_or_else(EntityId::generate);
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        self.insert_validated(vec![(id, components)]);
        Ok(id)
    }

    /// Register several entities at once.
    ///
    /// Either every entity is registered or, if any id is already taken (or
    /// repeated within the batch), none is.
    pub fn add_entities<I>(&mut self, entities: I) -> Result<Vec<EntityId>, WorldError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut seen = HashSet::new();
        let mut staged = Vec::new();
        for entity in entities {
            let (id, components) = entity.into_parts();
            let id = id.unwrap_or_else(EntityId::generate);
            if self.entities.contains_key(&id) || !seen.insert(id) {
                return Err(WorldError::DuplicateEntity(id));
            }
            staged.push((id, components));
        }
        Ok(self.insert_validated(staged))
    }

    fn insert_validated(&mut self, staged: Vec<(EntityId, ComponentStore)>) -> Vec<EntityId> {
        let ids: Vec<EntityId> = staged.iter().map(|(id, _)| *id).collect();
        self.entities.extend(staged);

        let entities = &self.entities;
        for aspect in self.aspects.values_mut().filter(|aspect| aspect.is_attached()) {
            let mut added = Vec::new();
            for id in &ids {
                let matches = entities.get(id).is_some_and(|store| aspect.spec().matches(store));
                if matches && aspect.insert_member(*id) {
                    added.push(*id);
                }
            }
            if !added.is_empty() {
                aspect.dispatch(AspectEvent::EntitiesAdded(added));
            }
        }
        ids
    }

    /// Unregister one entity, handing it back with its components
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        let mut removed = self.remove_entities(&[id])?;
        removed.pop().ok_or(WorldError::EntityNotFound(id))
    }

    /// Unregister several entities.
    ///
    /// Fails without removing anything if any id is unknown. Aspects are
    /// notified before the entities are discarded.
    pub fn remove_entities(&mut self, ids: &[EntityId]) -> Result<Vec<Entity>, WorldError> {
        if let Some(missing) = ids.iter().find(|id| !self.entities.contains_key(*id)) {
            return Err(WorldError::EntityNotFound(*missing));
        }
        let mut seen = HashSet::new();
        let ids: Vec<EntityId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        for aspect in self.aspects.values_mut().filter(|aspect| aspect.is_attached()) {
            let removed: Vec<EntityId> = ids
                .iter()
                .copied()
                .filter(|id| aspect.remove_member(*id))
                .collect();
            if !removed.is_empty() {
                aspect.dispatch(AspectEvent::EntitiesRemoved(removed));
            }
        }

        Ok(ids
            .into_iter()
            .filter_map(|id| {
                self.entities
                    .shift_remove(&id)
                    .map(|components| Entity::from_parts(id, components))
            })
            .collect())
    }

    /// Unregister every entity
    pub fn clear_entities(&mut self) -> Vec<Entity> {
        for aspect in self.aspects.values_mut().filter(|aspect| aspect.is_attached()) {
            if !aspect.is_empty() {
                aspect.clear_members();
                aspect.dispatch(AspectEvent::EntitiesCleared);
            }
        }
        self.entities
            .drain(..)
            .map(|(id, components)| Entity::from_parts(id, components))
            .collect()
    }

    /// Re-order the registry; aspects follow the new order
    pub fn sort_entities_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&EntityId, &ComponentStore, &EntityId, &ComponentStore) -> Ordering,
    {
        self.entities.sort_by(|a, a_store, b, b_store| compare(a, a_store, b, b_store));
        let entities = &self.entities;
        for aspect in self.aspects.values_mut().filter(|aspect| aspect.is_attached()) {
            aspect.reorder(entities.keys().copied());
            aspect.dispatch(AspectEvent::EntitiesSorted);
        }
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered entity ids, in registry order
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate over registered entities and their components
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &ComponentStore)> {
        self.entities.iter().map(|(id, store)| (*id, store))
    }

    /// Components of a registered entity
    pub fn components(&self, id: EntityId) -> Option<&ComponentStore> {
        self.entities.get(&id)
    }

    // ---------------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------------

    /// Get a component from an entity; `None` if either is absent
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id).and_then(ComponentStore::get::<T>)
    }

    /// Get a mutable component from an entity; `None` if either is absent
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id).and_then(ComponentStore::get_mut::<T>)
    }

    /// Get a component the caller depends on
    pub fn require<T: Component>(&self, id: EntityId) -> Result<&T, WorldError> {
        self.entities
            .get(&id)
            .ok_or(WorldError::EntityNotFound(id))?
            .get::<T>()
            .ok_or_else(|| missing::<T>(id))
    }

    /// Get a mutable component the caller depends on
    pub fn require_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T, WorldError> {
        self.entities
            .get_mut(&id)
            .ok_or(WorldError::EntityNotFound(id))?
            .get_mut::<T>()
            .ok_or_else(|| missing::<T>(id))
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(ComponentStore::has::<T>)
    }

    /// Add a component to an entity, returning the instance it replaced
    pub fn add_component<T: Component>(&mut self, id: EntityId, component: T) -> Result<Option<T>, WorldError> {
        let previous = self.store_mut(id)?.insert(component);
        self.sync_entity(
            id,
            AspectEvent::ComponentsAdded {
                entity: id,
                components: vec![ComponentType::of::<T>()],
            },
            Notify::AfterTransition,
        );
        Ok(previous)
    }

    /// Add several components to an entity with a single notification
    pub fn add_components(&mut self, id: EntityId, components: ComponentSet) -> Result<(), WorldError> {
        let store = self.store_mut(id)?;
        if components.is_empty() {
            return Ok(());
        }
        let mut kinds = Vec::with_capacity(components.len());
        for component in components.into_inner() {
            kinds.push(component.kind());
            store.insert_stored(component);
        }
        self.sync_entity(
            id,
            AspectEvent::ComponentsAdded {
                entity: id,
                components: kinds,
            },
            Notify::AfterTransition,
        );
        Ok(())
    }

    /// Remove a component from an entity.
    ///
    /// Returns `Ok(None)` without notifying anyone if the component is absent.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Result<Option<T>, WorldError> {
        let removed = self.store_mut(id)?.remove::<T>();
        if removed.is_some() {
            self.sync_entity(
                id,
                AspectEvent::ComponentsRemoved {
                    entity: id,
                    components: vec![ComponentType::of::<T>()],
                },
                Notify::BeforeTransition,
            );
        }
        Ok(removed)
    }

    /// Remove several component types from an entity with a single notification
    pub fn remove_components(&mut self, id: EntityId, kinds: &[ComponentType]) -> Result<Vec<StoredComponent>, WorldError> {
        let store = self.store_mut(id)?;
        let removed: Vec<StoredComponent> = kinds.iter().filter_map(|kind| store.remove_type(*kind)).collect();
        if !removed.is_empty() {
            self.sync_entity(
                id,
                AspectEvent::ComponentsRemoved {
                    entity: id,
                    components: removed.iter().map(StoredComponent::kind).collect(),
                },
                Notify::BeforeTransition,
            );
        }
        Ok(removed)
    }

    /// Remove every component from an entity
    pub fn clear_components(&mut self, id: EntityId) -> Result<Vec<StoredComponent>, WorldError> {
        let removed = self.store_mut(id)?.clear();
        if !removed.is_empty() {
            self.sync_entity(id, AspectEvent::ComponentsCleared { entity: id }, Notify::BeforeTransition);
        }
        Ok(removed)
    }

    /// Re-order the components of an entity
    pub fn sort_components_by<F>(&mut self, id: EntityId, compare: F) -> Result<(), WorldError>
    where
        F: FnMut(&StoredComponent, &StoredComponent) -> Ordering,
    {
        self.store_mut(id)?.sort_by(compare);
        self.sync_entity(id, AspectEvent::ComponentsSorted { entity: id }, Notify::BeforeTransition);
        Ok(())
    }

    fn store_mut(&mut self, id: EntityId) -> Result<&mut ComponentStore, WorldError> {
        self.entities.get_mut(&id).ok_or(WorldError::EntityNotFound(id))
    }

    /// Recompute membership of `id` in every attached aspect and notify members
    fn sync_entity(&mut self, id: EntityId, event: AspectEvent, notify: Notify) {
        let Some(store) = self.entities.get(&id) else {
            return;
        };
        for aspect in self.aspects.values_mut().filter(|aspect| aspect.is_attached()) {
            if notify == Notify::BeforeTransition && aspect.contains(id) {
                aspect.dispatch(event.clone());
            }
            match (aspect.contains(id), aspect.spec().matches(store)) {
                (false, true) => {
                    aspect.insert_member(id);
                    aspect.dispatch(AspectEvent::EntitiesAdded(vec![id]));
                }
                (true, false) => {
                    aspect.remove_member(id);
                    aspect.dispatch(AspectEvent::EntitiesRemoved(vec![id]));
                }
                _ => {}
            }
            if notify == Notify::AfterTransition && aspect.contains(id) {
                aspect.dispatch(event.clone());
            }
        }
    }

    // ---------------------------------------------------------------------
    // Aspects
    // ---------------------------------------------------------------------

    /// Create an attached aspect, seeded by one full scan of the registry
    pub fn create_aspect(&mut self, spec: AspectSpec) -> AspectId {
        let mut aspect = Aspect::new(spec);
        aspect.attach(self.iter());
        log::debug!("Created aspect tracking {} entities", aspect.len());
        self.aspects.insert(aspect)
    }

    /// Re-attach a detached aspect, re-seeding it from the registry
    pub fn attach_aspect(&mut self, id: AspectId) -> Result<(), WorldError> {
        let entities = &self.entities;
        let aspect = self.aspects.get_mut(id).ok_or(WorldError::UnknownAspect)?;
        aspect.attach(entities.iter().map(|(id, store)| (*id, store)));
        Ok(())
    }

    /// Stop tracking; the aspect keeps its handle but receives no further events.
    ///
    /// Aspects owned by a system are rejected with [`WorldError::AspectOwned`].
    pub fn detach_aspect(&mut self, id: AspectId) -> Result<(), WorldError> {
        let aspect = self.aspects.get_mut(id).ok_or(WorldError::UnknownAspect)?;
        if aspect.is_system_owned() {
            return Err(WorldError::AspectOwned);
        }
        aspect.detach();
        Ok(())
    }

    /// Detach and drop an aspect.
    ///
    /// Aspects owned by a system are rejected with [`WorldError::AspectOwned`].
    pub fn destroy_aspect(&mut self, id: AspectId) -> Result<Aspect, WorldError> {
        match self.aspects.get(id) {
            None => Err(WorldError::UnknownAspect),
            Some(aspect) if aspect.is_system_owned() => Err(WorldError::AspectOwned),
            Some(_) => self.release_aspect(id).ok_or(WorldError::UnknownAspect),
        }
    }

    /// Detach and drop an aspect regardless of ownership
    pub(crate) fn release_aspect(&mut self, id: AspectId) -> Option<Aspect> {
        self.aspects.remove(id).map(|mut aspect| {
            aspect.detach();
            aspect
        })
    }

    /// Look up an aspect
    pub fn aspect(&self, id: AspectId) -> Option<&Aspect> {
        self.aspects.get(id)
    }

    /// Whether the aspect exists and is tracking the registry
    pub fn is_aspect_attached(&self, id: AspectId) -> bool {
        self.aspects.get(id).is_some_and(Aspect::is_attached)
    }

    /// Subscribe a listener to an attached aspect
    pub fn add_aspect_listener<L>(&mut self, id: AspectId, listener: L) -> Result<ListenerId, WorldError>
    where
        L: AspectListener + 'static,
    {
        match self.aspects.get_mut(id) {
            Some(aspect) if aspect.is_attached() => Ok(aspect.add_listener(Box::new(listener))),
            _ => Err(WorldError::UnknownAspect),
        }
    }

    /// Unsubscribe a listener, handing it back
    pub fn remove_aspect_listener(&mut self, id: AspectId, listener: ListenerId) -> Option<Box<dyn AspectListener>> {
        self.aspects.get_mut(id)?.remove_listener(listener)
    }

    pub(crate) fn aspect_mut(&mut self, id: AspectId) -> Option<&mut Aspect> {
        self.aspects.get_mut(id)
    }
}

fn missing<T: Component>(entity: EntityId) -> WorldError {
    WorldError::MissingComponent {
        entity,
        component: ComponentType::of::<T>().short_name(),
    }
}

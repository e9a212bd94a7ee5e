//! Aspects: live, filtered views over the entities of a world
//!
//! An aspect is defined by three component-type sets:
//!
//! - `all`: an entity must have every one of these types
//! - `exclude`: an entity must have none of these types
//! - `one_of`: an entity must have at least one of these types (vacuously
//!   true when the set is empty)
//!
//! The [`World`](super::World) seeds an aspect with one full scan when it is
//! created and afterwards keeps its member list current incrementally on every
//! entity and component mutation. Listeners observe the changes through
//! [`AspectEvent`]s.

use super::component::{Component, ComponentStore, ComponentType};
use super::entity::EntityId;
use bitflags::bitflags;
use indexmap::IndexSet;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

new_key_type! {
    /// Handle to an aspect hosted by a world
    pub struct AspectId;

    /// Handle to a listener registered on an aspect
    pub struct ListenerId;
}

type TypeSet = SmallVec<[ComponentType; 4]>;

/// Component-type predicate describing which entities an aspect tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AspectSpec {
    all: TypeSet,
    exclude: TypeSet,
    one_of: TypeSet,
}

impl AspectSpec {
    /// An empty predicate (matches every entity)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `T`
    pub fn all<T: Component>(self) -> Self {
        self.all_type(ComponentType::of::<T>())
    }

    /// Reject entities having `T`
    pub fn exclude<T: Component>(self) -> Self {
        self.exclude_type(ComponentType::of::<T>())
    }

    /// Add `T` to the one-of set
    pub fn one_of<T: Component>(self) -> Self {
        self.one_of_type(ComponentType::of::<T>())
    }

    /// Require the given type
    pub fn all_type(mut self, kind: ComponentType) -> Self {
        push_unique(&mut self.all, kind);
        self
    }

    /// Reject entities having the given type
    pub fn exclude_type(mut self, kind: ComponentType) -> Self {
        push_unique(&mut self.exclude, kind);
        self
    }

    /// Add the given type to the one-of set
    pub fn one_of_type(mut self, kind: ComponentType) -> Self {
        push_unique(&mut self.one_of, kind);
        self
    }

    /// Types that must all be present
    pub fn all_types(&self) -> &[ComponentType] {
        &self.all
    }

    /// Types that must all be absent
    pub fn excluded_types(&self) -> &[ComponentType] {
        &self.exclude
    }

    /// Types of which at least one must be present
    pub fn one_of_types(&self) -> &[ComponentType] {
        &self.one_of
    }

    /// Evaluate the predicate against a component store
    pub fn matches(&self, components: &ComponentStore) -> bool {
        self.all.iter().all(|kind| components.has_type(*kind))
            && !self.exclude.iter().any(|kind| components.has_type(*kind))
            && (self.one_of.is_empty() || self.one_of.iter().any(|kind| components.has_type(*kind)))
    }
}

fn push_unique(set: &mut TypeSet, kind: ComponentType) {
    if !set.contains(&kind) {
        set.push(kind);
    }
}

bitflags! {
    /// Mask over [`AspectEvent`] variants, used by listeners to opt in per tag
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AspectEventKind: u8 {
        /// Entities started matching
        const ENTITIES_ADDED = 1 << 0;
        /// Entities stopped matching
        const ENTITIES_REMOVED = 1 << 1;
        /// The member list was emptied by a registry clear
        const ENTITIES_CLEARED = 1 << 2;
        /// The member list was re-ordered
        const ENTITIES_SORTED = 1 << 3;
        /// Components were added to a member
        const COMPONENTS_ADDED = 1 << 4;
        /// Components were removed from a member
        const COMPONENTS_REMOVED = 1 << 5;
        /// A member's components were cleared
        const COMPONENTS_CLEARED = 1 << 6;
        /// A member's components were re-ordered
        const COMPONENTS_SORTED = 1 << 7;
    }
}

/// Structured change notification delivered by an aspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AspectEvent {
    /// Entities that now satisfy the predicate
    EntitiesAdded(Vec<EntityId>),
    /// Entities that no longer satisfy the predicate (or left the world)
    EntitiesRemoved(Vec<EntityId>),
    /// Every member left at once
    EntitiesCleared,
    /// Members were re-ordered
    EntitiesSorted,
    /// Components added to a member entity
    ComponentsAdded {
        /// The member entity
        entity: EntityId,
        /// Types of the added components
        components: Vec<ComponentType>,
    },
    /// Components removed from a member entity
    ComponentsRemoved {
        /// The member entity
        entity: EntityId,
        /// Types of the removed components
        components: Vec<ComponentType>,
    },
    /// All components of a member entity were cleared
    ComponentsCleared {
        /// The member entity
        entity: EntityId,
    },
    /// Components of a member entity were re-ordered
    ComponentsSorted {
        /// The member entity
        entity: EntityId,
    },
}

impl AspectEvent {
    /// The tag of this event
    pub fn kind(&self) -> AspectEventKind {
        match self {
            Self::EntitiesAdded(_) => AspectEventKind::ENTITIES_ADDED,
            Self::EntitiesRemoved(_) => AspectEventKind::ENTITIES_REMOVED,
            Self::EntitiesCleared => AspectEventKind::ENTITIES_CLEARED,
            Self::EntitiesSorted => AspectEventKind::ENTITIES_SORTED,
            Self::ComponentsAdded { .. } => AspectEventKind::COMPONENTS_ADDED,
            Self::ComponentsRemoved { .. } => AspectEventKind::COMPONENTS_REMOVED,
            Self::ComponentsCleared { .. } => AspectEventKind::COMPONENTS_CLEARED,
            Self::ComponentsSorted { .. } => AspectEventKind::COMPONENTS_SORTED,
        }
    }
}

/// Receiver of aspect change notifications
///
/// Closures taking `&AspectEvent` implement this trait and receive every kind.
pub trait AspectListener {
    /// Event kinds this listener wants to receive
    fn interests(&self) -> AspectEventKind {
        AspectEventKind::all()
    }

    /// Handle one event
    fn on_event(&mut self, event: &AspectEvent);
}

impl<F> AspectListener for F
where
    F: FnMut(&AspectEvent),
{
    fn on_event(&mut self, event: &AspectEvent) {
        self(event);
    }
}

/// A closure listener restricted to a subset of event kinds
pub struct FilteredListener<F> {
    kinds: AspectEventKind,
    handler: F,
}

impl<F: FnMut(&AspectEvent)> FilteredListener<F> {
    /// Wrap `handler` so it only receives `kinds`
    pub fn new(kinds: AspectEventKind, handler: F) -> Self {
        Self { kinds, handler }
    }
}

impl<F: FnMut(&AspectEvent)> AspectListener for FilteredListener<F> {
    fn interests(&self) -> AspectEventKind {
        self.kinds
    }

    fn on_event(&mut self, event: &AspectEvent) {
        (self.handler)(event);
    }
}

/// Queued events for the system owning an aspect
#[derive(Debug)]
struct Inbox {
    kinds: AspectEventKind,
    events: Vec<AspectEvent>,
}

/// Live state of an aspect
pub struct Aspect {
    spec: AspectSpec,
    members: IndexSet<EntityId>,
    attached: bool,
    listeners: SlotMap<ListenerId, Box<dyn AspectListener>>,
    inbox: Option<Inbox>,
    system_owned: bool,
}

impl Aspect {
    pub(crate) fn new(spec: AspectSpec) -> Self {
        Self {
            spec,
            members: IndexSet::new(),
            attached: false,
            listeners: SlotMap::with_key(),
            inbox: None,
            system_owned: false,
        }
    }

    /// The predicate this aspect tracks
    pub fn spec(&self) -> &AspectSpec {
        &self.spec
    }

    /// Whether the aspect is still tracking its world
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether a system owns this aspect; only removing the system releases it
    pub fn is_system_owned(&self) -> bool {
        self.system_owned
    }

    pub(crate) fn mark_system_owned(&mut self) {
        self.system_owned = true;
    }

    /// Matching entities, in registry order at the time they started matching
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    /// Snapshot of the matching entities
    pub fn to_vec(&self) -> Vec<EntityId> {
        self.members.iter().copied().collect()
    }

    /// Whether `entity` currently matches
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Number of matching entities
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no entity matches
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Replace the member list with a full scan and start tracking
    pub(crate) fn attach<'a, I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = (EntityId, &'a ComponentStore)>,
    {
        self.members = entities
            .into_iter()
            .filter(|(_, components)| self.spec.matches(components))
            .map(|(id, _)| id)
            .collect();
        self.attached = true;
    }

    /// Stop tracking; drops every listener and any queued events
    pub(crate) fn detach(&mut self) {
        self.attached = false;
        self.listeners.clear();
        self.inbox = None;
    }

    pub(crate) fn add_listener(&mut self, listener: Box<dyn AspectListener>) -> ListenerId {
        self.listeners.insert(listener)
    }

    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn AspectListener>> {
        self.listeners.remove(id)
    }

    /// Queue events of the given kinds for the owning system
    pub(crate) fn open_inbox(&mut self, kinds: AspectEventKind) {
        if !kinds.is_empty() {
            self.inbox = Some(Inbox {
                kinds,
                events: Vec::new(),
            });
        }
    }

    pub(crate) fn drain_inbox(&mut self) -> Vec<AspectEvent> {
        self.inbox
            .as_mut()
            .map(|inbox| std::mem::take(&mut inbox.events))
            .unwrap_or_default()
    }

    pub(crate) fn insert_member(&mut self, entity: EntityId) -> bool {
        self.members.insert(entity)
    }

    pub(crate) fn remove_member(&mut self, entity: EntityId) -> bool {
        self.members.shift_remove(&entity)
    }

    pub(crate) fn clear_members(&mut self) {
        self.members.clear();
    }

    /// Re-order members to follow `order`
    pub(crate) fn reorder<I: IntoIterator<Item = EntityId>>(&mut self, order: I) {
        let reordered: IndexSet<EntityId> = order
            .into_iter()
            .filter(|id| self.members.contains(id))
            .collect();
        self.members = reordered;
    }

    /// Deliver an event to every interested listener and the owner's inbox
    pub(crate) fn dispatch(&mut self, event: AspectEvent) {
        if !self.attached {
            return;
        }
        let kind = event.kind();
        for listener in self.listeners.values_mut() {
            if listener.interests().intersects(kind) {
                listener.on_event(&event);
            }
        }
        if let Some(inbox) = self.inbox.as_mut() {
            if inbox.kinds.intersects(kind) {
                inbox.events.push(event);
            }
        }
    }
}

impl std::fmt::Debug for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aspect")
            .field("spec", &self.spec)
            .field("members", &self.members.len())
            .field("attached", &self.attached)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

//! Component trait and per-entity component storage

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker trait for components
///
/// A component is a plain data record; it has no identity beyond the entity it
/// is attached to and its type.
pub trait Component: 'static {}

/// Runtime tag for a component type
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Get the tag for `T`
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The Rust type id
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name (diagnostics only)
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A type-erased component instance
pub struct StoredComponent {
    kind: ComponentType,
    value: Box<dyn Any>,
}

impl StoredComponent {
    /// Box a component
    pub fn new<T: Component>(component: T) -> Self {
        Self {
            kind: ComponentType::of::<T>(),
            value: Box::new(component),
        }
    }

    /// The component's type tag
    pub fn kind(&self) -> ComponentType {
        self.kind
    }

    /// Borrow the value as `T`
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Mutably borrow the value as `T`
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Take the value back out as `T`
    pub fn into_inner<T: Component>(self) -> Result<T, Self> {
        let kind = self.kind;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Self { kind, value })
    }
}

impl fmt::Debug for StoredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoredComponent").field(&self.kind).finish()
    }
}

/// Per-entity bag of components, at most one instance per type.
///
/// Insertion order is preserved until the store is explicitly sorted.
#[derive(Debug, Default)]
pub struct ComponentStore {
    components: Vec<StoredComponent>,
}

impl ComponentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a component, returning the instance it replaced
    pub fn insert<T: Component>(&mut self, component: T) -> Option<T> {
        self.insert_stored(StoredComponent::new(component))
            .and_then(|previous| previous.into_inner::<T>().ok())
    }

    /// Insert a boxed component, returning the instance it replaced
    pub fn insert_stored(&mut self, component: StoredComponent) -> Option<StoredComponent> {
        match self.position(component.kind) {
            Some(index) => Some(std::mem::replace(&mut self.components[index], component)),
            None => {
                self.components.push(component);
                None
            }
        }
    }

    /// Remove the component of type `T`
    pub fn remove<T: Component>(&mut self) -> Option<T> {
        self.remove_type(ComponentType::of::<T>())
            .and_then(|stored| stored.into_inner::<T>().ok())
    }

    /// Remove the component with the given type tag
    pub fn remove_type(&mut self, kind: ComponentType) -> Option<StoredComponent> {
        self.position(kind).map(|index| self.components.remove(index))
    }

    /// Borrow the component of type `T`
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.position(ComponentType::of::<T>())
            .and_then(|index| self.components[index].downcast_ref::<T>())
    }

    /// Mutably borrow the component of type `T`
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.position(ComponentType::of::<T>())
            .and_then(move |index| self.components[index].downcast_mut::<T>())
    }

    /// Whether a component of type `T` is present
    pub fn has<T: Component>(&self) -> bool {
        self.has_type(ComponentType::of::<T>())
    }

    /// Whether a component with the given tag is present
    pub fn has_type(&self, kind: ComponentType) -> bool {
        self.position(kind).is_some()
    }

    /// Type tags of all stored components, in store order
    pub fn types(&self) -> Vec<ComponentType> {
        self.components.iter().map(StoredComponent::kind).collect()
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Drop every component, returning what was removed
    pub fn clear(&mut self) -> Vec<StoredComponent> {
        std::mem::take(&mut self.components)
    }

    /// Reorder the stored components
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&StoredComponent, &StoredComponent) -> Ordering,
    {
        self.components.sort_by(compare);
    }

    /// Iterate over the stored components
    pub fn iter(&self) -> impl Iterator<Item = &StoredComponent> {
        self.components.iter()
    }

    fn position(&self, kind: ComponentType) -> Option<usize> {
        self.components.iter().position(|stored| stored.kind == kind)
    }
}

/// Several components added to an entity in one call
#[derive(Debug, Default)]
pub struct ComponentSet {
    components: Vec<StoredComponent>,
}

impl ComponentSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component to the set (builder pattern)
    pub fn with<T: Component>(mut self, component: T) -> Self {
        self.components.push(StoredComponent::new(component));
        self
    }

    /// Number of components in the set
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn into_inner(self) -> Vec<StoredComponent> {
        self.components
    }
}

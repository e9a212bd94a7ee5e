//! Systems: priority-ordered units of per-tick logic
//!
//! A [`System`] bundles a name, a priority, an update/render phase flag, an
//! optional [`AspectSpec`] and a boxed [`Process`] strategy. The strategy
//! returns a [`Completion`] for every call: ready when the work finished
//! synchronously, pending when it continues as a future. The dispatch modes
//! of the [`EcsEngine`](super::EcsEngine) only differ in how they wait on
//! that handle.

use super::aspect::{AspectEvent, AspectEventKind, AspectId, AspectSpec};
use super::entity::EntityId;
use super::run::RunOptions;
use super::world::{World, WorldError};
use crate::input::InputSnapshot;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors produced by system work
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    /// A registry lookup failed while processing
    #[error(transparent)]
    World(#[from] WorldError),

    /// The system reported a failure
    #[error("{0}")]
    Failed(String),

    /// The system's asynchronous task panicked or was cancelled
    #[error("System task aborted: {0}")]
    Panicked(String),
}

impl SystemError {
    /// Create a failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Boxed future returned by asynchronous system work
pub type SystemFuture = Pin<Box<dyn Future<Output = Result<(), SystemError>>>>;

/// Uniform completion handle for one call of a system
pub enum Completion {
    /// The work finished during the call
    Ready(Result<(), SystemError>),
    /// The work continues asynchronously
    Pending(SystemFuture),
}

impl Completion {
    /// Successful synchronous completion
    pub fn done() -> Self {
        Self::Ready(Ok(()))
    }

    /// Failed synchronous completion
    pub fn failed(error: SystemError) -> Self {
        Self::Ready(Err(error))
    }

    /// Asynchronous completion
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), SystemError>> + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Whether the work already finished
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl From<Result<(), SystemError>> for Completion {
    fn from(result: Result<(), SystemError>) -> Self {
        Self::Ready(result)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Everything a system may touch during one call
pub struct SystemContext<'a> {
    world: &'a mut World,
    aspect: Option<AspectId>,
    input: &'a InputSnapshot,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(world: &'a mut World, aspect: Option<AspectId>, input: &'a InputSnapshot) -> Self {
        Self { world, aspect, input }
    }

    /// The entity registry
    pub fn world(&self) -> &World {
        self.world
    }

    /// Mutable access to the entity registry
    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }

    /// The aspect owned by the running system, if it requested one
    pub fn aspect(&self) -> Option<AspectId> {
        self.aspect
    }

    /// Entities this system covers: its aspect's members, or every entity
    pub fn entities(&self) -> Vec<EntityId> {
        match self.aspect {
            Some(id) => self
                .world
                .aspect(id)
                .map(super::aspect::Aspect::to_vec)
                .unwrap_or_default(),
            None => self.world.ids(),
        }
    }

    /// Input state captured at the start of the frame
    pub fn input(&self) -> &InputSnapshot {
        self.input
    }
}

/// Processing strategy of a system
pub trait Process {
    /// Do one unit of work
    fn process(&mut self, ctx: &mut SystemContext<'_>, options: &RunOptions) -> Completion;

    /// Aspect events this strategy wants delivered to [`Process::on_aspect_event`]
    fn interests(&self) -> AspectEventKind {
        AspectEventKind::empty()
    }

    /// Handle a queued aspect event
    fn on_aspect_event(&mut self, _event: &AspectEvent) {}
}

/// Per-entity processing hook used by [`ForEachEntity`]
pub trait ProcessEntity {
    /// Process one entity.
    ///
    /// `index` is the position of `entity` within `entities`, the full list
    /// being iterated.
    fn process_entity(
        &mut self,
        ctx: &mut SystemContext<'_>,
        entity: EntityId,
        index: usize,
        entities: &[EntityId],
        options: &RunOptions,
    ) -> Result<(), SystemError>;

    /// Aspect events this processor wants delivered
    fn interests(&self) -> AspectEventKind {
        AspectEventKind::empty()
    }

    /// Handle a queued aspect event
    fn on_aspect_event(&mut self, _event: &AspectEvent) {}
}

/// Runs a [`ProcessEntity`] hook over every covered entity in order.
///
/// Entities removed from the world by an earlier call in the same pass are
/// skipped. The first error stops the pass.
pub struct ForEachEntity<P>(pub P);

impl<P: ProcessEntity> Process for ForEachEntity<P> {
    fn process(&mut self, ctx: &mut SystemContext<'_>, options: &RunOptions) -> Completion {
        let entities = ctx.entities();
        for (index, entity) in entities.iter().copied().enumerate() {
            if !ctx.world().contains(entity) {
                continue;
            }
            if let Err(error) = self.0.process_entity(ctx, entity, index, &entities, options) {
                return Completion::failed(error);
            }
        }
        Completion::done()
    }

    fn interests(&self) -> AspectEventKind {
        self.0.interests()
    }

    fn on_aspect_event(&mut self, event: &AspectEvent) {
        self.0.on_aspect_event(event);
    }
}

struct FnProcess<F>(F);

impl<F> Process for FnProcess<F>
where
    F: FnMut(&mut SystemContext<'_>, &RunOptions) -> Completion,
{
    fn process(&mut self, ctx: &mut SystemContext<'_>, options: &RunOptions) -> Completion {
        (self.0)(ctx, options)
    }
}

/// A unit of per-tick logic
pub struct System {
    name: String,
    priority: i32,
    render: bool,
    aspect_spec: Option<AspectSpec>,
    processor: Box<dyn Process>,
}

impl System {
    /// Create an update-phase system with priority 0 and no aspect
    pub fn new(name: impl Into<String>, processor: impl Process + 'static) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            render: false,
            aspect_spec: None,
            processor: Box::new(processor),
        }
    }

    /// Create a system from a closure
    pub fn from_fn<F>(name: impl Into<String>, process: F) -> Self
    where
        F: FnMut(&mut SystemContext<'_>, &RunOptions) -> Completion + 'static,
    {
        Self::new(name, FnProcess(process))
    }

    /// Create a system running a per-entity hook
    pub fn for_each(name: impl Into<String>, processor: impl ProcessEntity + 'static) -> Self {
        Self::new(name, ForEachEntity(processor))
    }

    /// Set the priority; lower runs earlier (builder pattern)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict the system to entities matching `spec` (builder pattern)
    pub fn with_aspect(mut self, spec: AspectSpec) -> Self {
        self.aspect_spec = Some(spec);
        self
    }

    /// Run the system in the render phase instead of the update phase
    pub fn render_system(mut self) -> Self {
        self.render = true;
        self
    }

    /// System name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// System priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the system runs in the render phase
    pub fn is_render_system(&self) -> bool {
        self.render
    }

    /// The aspect requested by the system
    pub fn aspect_spec(&self) -> Option<&AspectSpec> {
        self.aspect_spec.as_ref()
    }

    pub(crate) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub(crate) fn processor_mut(&mut self) -> &mut dyn Process {
        self.processor.as_mut()
    }

    pub(crate) fn interests(&self) -> AspectEventKind {
        self.processor.interests()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("render", &self.render)
            .field("aspect_spec", &self.aspect_spec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Component, ComponentSet};

    struct Tag;
    impl Component for Tag {}

    struct Visit(Vec<(EntityId, usize, usize)>);

    impl ProcessEntity for Visit {
        fn process_entity(
            &mut self,
            _ctx: &mut SystemContext<'_>,
            entity: EntityId,
            index: usize,
            entities: &[EntityId],
            _options: &RunOptions,
        ) -> Result<(), SystemError> {
            self.0.push((entity, index, entities.len()));
            Ok(())
        }
    }

    #[test]
    fn test_system_defaults() {
        let system = System::from_fn("noop", |_, _| Completion::done());
        assert_eq!(system.name(), "noop");
        assert_eq!(system.priority(), 0);
        assert!(!system.is_render_system());
        assert!(system.aspect_spec().is_none());
        assert!(system.interests().is_empty());
    }

    #[test]
    fn test_builders() {
        let system = System::from_fn("draw", |_, _| Completion::done())
            .with_priority(-3)
            .with_aspect(AspectSpec::new().all::<Tag>())
            .render_system();
        assert_eq!(system.priority(), -3);
        assert!(system.is_render_system());
        assert_eq!(system.aspect_spec(), Some(&AspectSpec::new().all::<Tag>()));
    }

    #[test]
    fn test_for_each_visits_every_entity_in_order() {
        let mut world = World::new();
        let ids: Vec<EntityId> = (0..3).map(|_| world.spawn()).collect();
        let input = InputSnapshot::default();
        let mut visitor = ForEachEntity(Visit(Vec::new()));

        let mut ctx = SystemContext::new(&mut world, None, &input);
        let completion = visitor.process(&mut ctx, &RunOptions::update(16.0));

        assert!(matches!(completion, Completion::Ready(Ok(()))));
        let expected: Vec<_> = ids.iter().enumerate().map(|(i, id)| (*id, i, 3)).collect();
        assert_eq!(visitor.0 .0, expected);
    }

    #[test]
    fn test_for_each_uses_aspect_members() {
        let mut world = World::new();
        world.spawn();
        let tagged = world.spawn_with(ComponentSet::new().with(Tag));
        let aspect = world.create_aspect(AspectSpec::new().all::<Tag>());
        let input = InputSnapshot::default();
        let mut visitor = ForEachEntity(Visit(Vec::new()));

        let mut ctx = SystemContext::new(&mut world, Some(aspect), &input);
        visitor.process(&mut ctx, &RunOptions::update(16.0));

        assert_eq!(visitor.0 .0, vec![(tagged, 0, 1)]);
    }

    #[test]
    fn test_for_each_stops_on_error() {
        struct FailSecond(usize);
        impl ProcessEntity for FailSecond {
            fn process_entity(
                &mut self,
                _ctx: &mut SystemContext<'_>,
                _entity: EntityId,
                index: usize,
                _entities: &[EntityId],
                _options: &RunOptions,
            ) -> Result<(), SystemError> {
                self.0 += 1;
                if index == 1 {
                    Err(SystemError::failed("second"))
                } else {
                    Ok(())
                }
            }
        }

        let mut world = World::new();
        for _ in 0..3 {
            world.spawn();
        }
        let input = InputSnapshot::default();
        let mut processor = ForEachEntity(FailSecond(0));
        let mut ctx = SystemContext::new(&mut world, None, &input);

        let completion = processor.process(&mut ctx, &RunOptions::update(1.0));
        assert!(matches!(completion, Completion::Ready(Err(SystemError::Failed(ref m))) if m == "second"));
        assert_eq!(processor.0 .0, 2);
    }

    #[test]
    fn test_missing_entity_surfaces_as_world_error() {
        let mut world = World::new();
        let ghost = EntityId::generate();
        let input = InputSnapshot::default();
        let mut system = System::from_fn("follow", move |ctx, _| {
            ctx.world().require::<Tag>(ghost).map(|_| ()).map_err(SystemError::from).into()
        });

        let mut ctx = SystemContext::new(&mut world, None, &input);
        let completion = system.processor_mut().process(&mut ctx, &RunOptions::default());
        assert!(matches!(
            completion,
            Completion::Ready(Err(SystemError::World(WorldError::EntityNotFound(id)))) if id == ghost
        ));
    }
}

//! ECS engine: the entity registry plus the ordered set of active systems
//!
//! Systems are invoked in ascending priority order (insertion order on ties)
//! under one of three dispatch strategies. Asynchronous system work runs on a
//! single-threaded `tokio` runtime; nothing ever leaves the calling thread.

use super::aspect::AspectId;
use super::run::{should_run_system, RunMode, RunOptions};
use super::system::{Completion, System, SystemContext, SystemError, SystemFuture};
use super::world::World;
use crate::input::InputSnapshot;
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;

new_key_type! {
    /// Handle to a system added to an [`EcsEngine`]
    pub struct SystemId;
}

/// A failure attributed to a named system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemFailure {
    /// Name of the failing system
    pub system: String,
    /// What went wrong
    pub error: SystemError,
}

impl fmt::Display for SystemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system '{}' failed: {}", self.system, self.error)
    }
}

/// ECS engine errors
#[derive(Error, Debug)]
pub enum EcsError {
    /// A single system failed during a run
    #[error("{0}")]
    SystemFailed(SystemFailure),

    /// Several systems failed during a parallel run
    #[error("{} systems failed: {}", .0.len(), join_failures(.0))]
    SystemsFailed(Vec<SystemFailure>),

    /// The system handle does not belong to this engine
    #[error("Unknown system")]
    UnknownSystem,

    /// The async runtime could not be created
    #[error("Failed to build async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn join_failures(failures: &[SystemFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl EcsError {
    /// Every system failure carried by this error
    pub fn failures(&self) -> &[SystemFailure] {
        match self {
            Self::SystemFailed(failure) => std::slice::from_ref(failure),
            Self::SystemsFailed(failures) => failures,
            Self::UnknownSystem | Self::Runtime(_) => &[],
        }
    }
}

struct SystemSlot {
    system: System,
    aspect: Option<AspectId>,
    seq: u64,
}

type Dispatch = fn(&mut EcsEngine, &RunOptions) -> Result<(), EcsError>;

/// Resolve a run mode to its dispatch strategy
fn dispatcher(mode: RunMode) -> Dispatch {
    match mode {
        RunMode::Default => run_default,
        RunMode::Successive => run_successive,
        RunMode::Parallel => run_parallel,
    }
}

/// Owner of the entity registry and the active systems
pub struct EcsEngine {
    world: World,
    systems: SlotMap<SystemId, SystemSlot>,
    order: Vec<SystemId>,
    next_seq: u64,
    input: InputSnapshot,
    detached: LocalSet,
    detached_failures: Rc<RefCell<Vec<SystemFailure>>>,
    runtime: Runtime,
}

impl EcsEngine {
    /// Create an engine with an empty world
    pub fn new() -> Result<Self, EcsError> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            world: World::new(),
            systems: SlotMap::with_key(),
            order: Vec::new(),
            next_seq: 0,
            input: InputSnapshot::default(),
            detached: LocalSet::new(),
            detached_failures: Rc::new(RefCell::new(Vec::new())),
            runtime,
        })
    }

    /// The entity registry
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the entity registry
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Input snapshot handed to systems
    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    /// Replace the input snapshot handed to systems
    pub fn set_input(&mut self, input: InputSnapshot) {
        self.input = input;
    }

    /// Attach a system.
    ///
    /// If the system requested an aspect, it is created now and stays attached
    /// until the system is removed.
    pub fn add_system(&mut self, system: System) -> SystemId {
        let aspect = system.aspect_spec().cloned().map(|spec| {
            let aspect = self.world.create_aspect(spec);
            if let Some(live) = self.world.aspect_mut(aspect) {
                live.mark_system_owned();
                live.open_inbox(system.interests());
            }
            aspect
        });

        let seq = self.next_seq;
        self.next_seq += 1;
        let priority = system.priority();
        log::debug!("Attached system '{}' (priority {priority})", system.name());

        let id = self.systems.insert(SystemSlot { system, aspect, seq });
        self.insert_ordered(id);
        id
    }

    /// Detach a system, tearing down its aspect before it leaves the active set
    pub fn remove_system(&mut self, id: SystemId) -> Result<System, EcsError> {
        let aspect = self.systems.get(id).ok_or(EcsError::UnknownSystem)?.aspect;
        if let Some(aspect) = aspect {
            self.world.release_aspect(aspect);
        }
        self.order.retain(|other| *other != id);
        let slot = self.systems.remove(id).ok_or(EcsError::UnknownSystem)?;
        log::debug!("Detached system '{}'", slot.system.name());
        Ok(slot.system)
    }

    /// Change a system's priority, keeping its tie-break position
    pub fn set_priority(&mut self, id: SystemId, priority: i32) -> Result<(), EcsError> {
        self.systems
            .get_mut(id)
            .ok_or(EcsError::UnknownSystem)?
            .system
            .set_priority(priority);
        self.order.retain(|other| *other != id);
        self.insert_ordered(id);
        Ok(())
    }

    fn sort_key(&self, id: SystemId) -> (i32, u64) {
        self.systems
            .get(id)
            .map_or((i32::MAX, u64::MAX), |slot| (slot.system.priority(), slot.seq))
    }

    fn insert_ordered(&mut self, id: SystemId) {
        let key = self.sort_key(id);
        let index = self.order.partition_point(|other| self.sort_key(*other) < key);
        self.order.insert(index, id);
    }

    /// Look up a system
    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.systems.get(id).map(|slot| &slot.system)
    }

    /// The aspect owned by a system
    pub fn system_aspect(&self, id: SystemId) -> Option<AspectId> {
        self.systems.get(id).and_then(|slot| slot.aspect)
    }

    /// Active systems in invocation order
    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &System)> {
        self.order
            .iter()
            .filter_map(|id| self.systems.get(*id).map(|slot| (*id, &slot.system)))
    }

    /// Number of active systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no system is active
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Deliver every queued aspect event to the systems that asked for them
    pub fn flush_events(&mut self) {
        for id in self.order.clone() {
            if let Some(slot) = self.systems.get_mut(id) {
                deliver_events(&mut self.world, slot);
            }
        }
    }

    /// Run every eligible system once.
    ///
    /// `None` options select the update phase. Must not be called from inside
    /// another async runtime.
    pub fn run(&mut self, options: impl Into<Option<RunOptions>>, mode: RunMode) -> Result<(), EcsError> {
        let options = options.into().unwrap_or_default();
        self.poll_detached();
        dispatcher(mode)(self, &options)
    }

    /// Drive all fire-and-forget work to completion
    pub fn settle_detached(&mut self) {
        let detached = std::mem::take(&mut self.detached);
        self.runtime.block_on(detached);
    }

    /// Failures collected from fire-and-forget work since the last call
    pub fn take_detached_failures(&mut self) -> Vec<SystemFailure> {
        std::mem::take(&mut *self.detached_failures.borrow_mut())
    }

    /// Drive a future to completion on the engine's runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(self.detached.run_until(future))
    }

    /// Give fire-and-forget work one chance to progress
    fn poll_detached(&self) {
        self.block_on(tokio::task::yield_now());
    }

    /// Invoke one system if it is eligible for this pass
    fn invoke(&mut self, id: SystemId, options: &RunOptions) -> Option<Completion> {
        let slot = self.systems.get_mut(id)?;
        if !should_run_system(Some(options), slot.system.is_render_system()) {
            return None;
        }
        deliver_events(&mut self.world, slot);
        let mut ctx = SystemContext::new(&mut self.world, slot.aspect, &self.input);
        Some(slot.system.processor_mut().process(&mut ctx, options))
    }

    fn failure(&self, id: SystemId, error: SystemError) -> SystemFailure {
        SystemFailure {
            system: self.system_name(id),
            error,
        }
    }

    fn system_name(&self, id: SystemId) -> String {
        self.systems
            .get(id)
            .map_or_else(String::new, |slot| slot.system.name().to_owned())
    }

    fn spawn_detached(&self, id: SystemId, future: SystemFuture) {
        let name = self.system_name(id);
        let failures = Rc::clone(&self.detached_failures);
        self.detached.spawn_local(async move {
            if let Err(error) = future.await {
                log::error!("Detached work of system '{name}' failed: {error}");
                failures.borrow_mut().push(SystemFailure { system: name, error });
            }
        });
    }
}

impl fmt::Debug for EcsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcsEngine")
            .field("entities", &self.world.len())
            .field("systems", &self.systems.len())
            .finish_non_exhaustive()
    }
}

fn deliver_events(world: &mut World, slot: &mut SystemSlot) {
    let Some(aspect) = slot.aspect.and_then(|aspect| world.aspect_mut(aspect)) else {
        return;
    };
    for event in aspect.drain_inbox() {
        slot.system.processor_mut().on_aspect_event(&event);
    }
}

/// Invoke in order without waiting on pending work
fn run_default(engine: &mut EcsEngine, options: &RunOptions) -> Result<(), EcsError> {
    for id in engine.order.clone() {
        match engine.invoke(id, options) {
            None | Some(Completion::Ready(Ok(()))) => {}
            Some(Completion::Ready(Err(error))) => {
                return Err(EcsError::SystemFailed(engine.failure(id, error)));
            }
            Some(Completion::Pending(future)) => engine.spawn_detached(id, future),
        }
    }
    Ok(())
}

/// Invoke in order, waiting for each system before the next
fn run_successive(engine: &mut EcsEngine, options: &RunOptions) -> Result<(), EcsError> {
    for id in engine.order.clone() {
        let result = match engine.invoke(id, options) {
            None => continue,
            Some(Completion::Ready(result)) => result,
            Some(Completion::Pending(future)) => engine.block_on(future),
        };
        if let Err(error) = result {
            return Err(EcsError::SystemFailed(engine.failure(id, error)));
        }
    }
    Ok(())
}

/// Invoke every system, then wait for all of them together
fn run_parallel(engine: &mut EcsEngine, options: &RunOptions) -> Result<(), EcsError> {
    let mut failures: Vec<(usize, SystemFailure)> = Vec::new();
    let mut pending = Vec::new();

    for (position, id) in engine.order.clone().into_iter().enumerate() {
        match engine.invoke(id, options) {
            None | Some(Completion::Ready(Ok(()))) => {}
            Some(Completion::Ready(Err(error))) => failures.push((position, engine.failure(id, error))),
            Some(Completion::Pending(future)) => pending.push((position, engine.system_name(id), future)),
        }
    }

    if !pending.is_empty() {
        let settled = engine.block_on(async move {
            let handles: Vec<_> = pending
                .into_iter()
                .map(|(position, name, future)| (position, name, tokio::task::spawn_local(future)))
                .collect();
            let mut settled = Vec::new();
            for (position, name, handle) in handles {
                let result = handle
                    .await
                    .unwrap_or_else(|join| Err(SystemError::Panicked(join.to_string())));
                if let Err(error) = result {
                    settled.push((position, SystemFailure { system: name, error }));
                }
            }
            settled
        });
        failures.extend(settled);
    }

    failures.sort_by_key(|(position, _)| *position);
    let mut failures: Vec<SystemFailure> = failures.into_iter().map(|(_, failure)| failure).collect();
    match failures.len() {
        0 => Ok(()),
        1 => Err(EcsError::SystemFailed(failures.remove(0))),
        _ => Err(EcsError::SystemsFailed(failures)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::aspect::{AspectEvent, AspectEventKind, AspectSpec};
    use crate::ecs::component::{Component, ComponentSet};
    use crate::ecs::world::WorldError;
    use crate::ecs::system::Process;
    use std::cell::Cell;

    struct Marker;
    impl Component for Marker {}

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging_system(name: &'static str, log: &Log) -> System {
        let log = Rc::clone(log);
        System::from_fn(name, move |_, _| {
            log.borrow_mut().push(name.to_owned());
            Completion::done()
        })
    }

    fn failing_system(name: &'static str, log: &Log) -> System {
        let log = Rc::clone(log);
        System::from_fn(name, move |_, _| {
            log.borrow_mut().push(name.to_owned());
            Completion::failed(SystemError::failed(format!("{name} broke")))
        })
    }

    fn async_system(name: &'static str, log: &Log) -> System {
        let log = Rc::clone(log);
        System::from_fn(name, move |_, _| {
            let log = Rc::clone(&log);
            log.borrow_mut().push(format!("{name}:start"));
            Completion::pending(async move {
                tokio::task::yield_now().await;
                log.borrow_mut().push(format!("{name}:done"));
                Ok(())
            })
        })
    }

    fn async_failing_system(name: &'static str) -> System {
        System::from_fn(name, move |_, _| {
            Completion::pending(async move {
                tokio::task::yield_now().await;
                Err(SystemError::failed(format!("{name} broke later")))
            })
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_priority_order_is_stable() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(logging_system("b", &log).with_priority(1));
        ecs.add_system(logging_system("a", &log).with_priority(0));
        ecs.add_system(logging_system("c", &log).with_priority(1));
        ecs.add_system(logging_system("first", &log).with_priority(-5));

        for mode in [RunMode::Default, RunMode::Successive, RunMode::Parallel] {
            log.borrow_mut().clear();
            ecs.run(RunOptions::update(16.0), mode).unwrap();
            assert_eq!(entries(&log), ["first", "a", "b", "c"], "{mode:?}");
        }
    }

    #[test]
    fn test_set_priority_reorders() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        let a = ecs.add_system(logging_system("a", &log));
        ecs.add_system(logging_system("b", &log));

        ecs.set_priority(a, 10).unwrap();
        ecs.run(None, RunMode::Default).unwrap();
        assert_eq!(entries(&log), ["b", "a"]);
        assert_eq!(ecs.systems().map(|(_, s)| s.name()).collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn test_phase_selects_systems() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(logging_system("update", &log));
        ecs.add_system(logging_system("render", &log).render_system());

        ecs.run(RunOptions::render(16.0), RunMode::Default).unwrap();
        assert_eq!(entries(&log), ["render"]);

        log.borrow_mut().clear();
        ecs.run(None, RunMode::Default).unwrap();
        assert_eq!(entries(&log), ["update"]);
    }

    #[test]
    fn test_aspect_lifecycle_follows_system() {
        let mut ecs = EcsEngine::new().unwrap();
        let id = ecs.add_system(
            System::from_fn("tagged", |_, _| Completion::done()).with_aspect(AspectSpec::new().all::<Marker>()),
        );
        let aspect = ecs.system_aspect(id).unwrap();
        assert!(ecs.world().is_aspect_attached(aspect));
        assert!(ecs.world().aspect(aspect).unwrap().is_system_owned());
        assert_eq!(ecs.world_mut().detach_aspect(aspect), Err(WorldError::AspectOwned));
        assert!(matches!(ecs.world_mut().destroy_aspect(aspect), Err(WorldError::AspectOwned)));
        assert!(ecs.world().is_aspect_attached(aspect));

        let notified = Rc::new(Cell::new(0));
        let sink = Rc::clone(&notified);
        ecs.world_mut()
            .add_aspect_listener(aspect, move |_: &AspectEvent| sink.set(sink.get() + 1))
            .unwrap();

        let removed = ecs.remove_system(id).unwrap();
        assert_eq!(removed.name(), "tagged");
        assert!(!ecs.world().is_aspect_attached(aspect));

        ecs.world_mut().spawn_with(ComponentSet::new().with(Marker));
        assert_eq!(notified.get(), 0);
        assert!(matches!(ecs.remove_system(id), Err(EcsError::UnknownSystem)));
    }

    #[test]
    fn test_aspect_filters_processed_entities() {
        let mut ecs = EcsEngine::new().unwrap();
        ecs.world_mut().spawn_with(ComponentSet::new().with(Marker));
        ecs.world_mut().spawn();
        ecs.world_mut().spawn_with(ComponentSet::new().with(Marker));

        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        ecs.add_system(
            System::from_fn("count", move |ctx, _| {
                sink.set(ctx.entities().len());
                Completion::done()
            })
            .with_aspect(AspectSpec::new().all::<Marker>()),
        );

        ecs.run(None, RunMode::Default).unwrap();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_default_returns_first_sync_failure() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(failing_system("broken", &log));
        ecs.add_system(logging_system("after", &log));

        let error = ecs.run(None, RunMode::Default).unwrap_err();
        assert_eq!(error.failures()[0].system, "broken");
        assert_eq!(entries(&log), ["broken"]);
    }

    #[test]
    fn test_default_does_not_wait_for_pending_work() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(async_system("slow", &log));
        ecs.add_system(logging_system("next", &log));

        ecs.run(None, RunMode::Default).unwrap();
        assert_eq!(entries(&log), ["slow:start", "next"]);

        ecs.settle_detached();
        assert_eq!(entries(&log), ["slow:start", "next", "slow:done"]);
    }

    #[test]
    fn test_default_collects_detached_failures() {
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(async_failing_system("late"));

        ecs.run(None, RunMode::Default).unwrap();
        ecs.settle_detached();

        let failures = ecs.take_detached_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].system, "late");
        assert!(ecs.take_detached_failures().is_empty());
    }

    #[test]
    fn test_successive_waits_for_each_system() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(async_system("slow", &log));
        ecs.add_system(logging_system("next", &log));

        ecs.run(None, RunMode::Successive).unwrap();
        assert_eq!(entries(&log), ["slow:start", "slow:done", "next"]);
    }

    #[test]
    fn test_successive_halts_on_failure() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(logging_system("first", &log));
        ecs.add_system(async_failing_system("late"));
        ecs.add_system(logging_system("never", &log));

        let error = ecs.run(None, RunMode::Successive).unwrap_err();
        assert!(matches!(error, EcsError::SystemFailed(ref failure) if failure.system == "late"));
        assert_eq!(entries(&log), ["first"]);
    }

    #[test]
    fn test_parallel_starts_all_then_waits() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(async_system("one", &log));
        ecs.add_system(async_system("two", &log));
        ecs.add_system(logging_system("sync", &log));

        ecs.run(None, RunMode::Parallel).unwrap();
        let entries = entries(&log);
        assert_eq!(&entries[..3], ["one:start", "two:start", "sync"]);
        assert!(entries.contains(&"one:done".to_owned()));
        assert!(entries.contains(&"two:done".to_owned()));
    }

    #[test]
    fn test_parallel_reports_every_failure() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(async_failing_system("late"));
        ecs.add_system(failing_system("now", &log));
        ecs.add_system(async_system("fine", &log));

        let error = ecs.run(None, RunMode::Parallel).unwrap_err();
        let names: Vec<&str> = error.failures().iter().map(|f| f.system.as_str()).collect();
        assert_eq!(names, ["late", "now"]);
        assert!(matches!(error, EcsError::SystemsFailed(_)));
        assert!(entries(&log).contains(&"fine:done".to_owned()));
    }

    #[test]
    fn test_parallel_single_failure() {
        let log = Log::default();
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(failing_system("only", &log));
        ecs.add_system(logging_system("other", &log));

        let error = ecs.run(None, RunMode::Parallel).unwrap_err();
        assert!(matches!(error, EcsError::SystemFailed(_)));
        assert_eq!(entries(&log), ["only", "other"]);
    }

    #[test]
    fn test_system_receives_aspect_events_before_processing() {
        struct Watcher {
            events: Rc<RefCell<Vec<AspectEventKind>>>,
        }

        impl Process for Watcher {
            fn process(&mut self, _ctx: &mut SystemContext<'_>, _options: &RunOptions) -> Completion {
                Completion::done()
            }

            fn interests(&self) -> AspectEventKind {
                AspectEventKind::ENTITIES_ADDED | AspectEventKind::ENTITIES_REMOVED
            }

            fn on_aspect_event(&mut self, event: &AspectEvent) {
                self.events.borrow_mut().push(event.kind());
            }
        }

        let events = Rc::new(RefCell::new(Vec::new()));
        let mut ecs = EcsEngine::new().unwrap();
        ecs.add_system(
            System::new("watcher", Watcher { events: Rc::clone(&events) })
                .with_aspect(AspectSpec::new().all::<Marker>()),
        );

        let id = ecs.world_mut().spawn_with(ComponentSet::new().with(Marker));
        ecs.world_mut().remove_component::<Marker>(id).unwrap();
        assert!(events.borrow().is_empty());

        ecs.run(None, RunMode::Default).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![AspectEventKind::ENTITIES_ADDED, AspectEventKind::ENTITIES_REMOVED]
        );

        ecs.world_mut().add_component(id, Marker).unwrap();
        ecs.flush_events();
        assert_eq!(events.borrow().len(), 3);
    }
}

//! Entity-Component-System implementation
//!
//! Entities live in a [`World`]; [`Aspect`]s keep filtered views of them up to
//! date as components change; [`System`]s run over those views in priority
//! order, driven by the [`EcsEngine`].

pub mod aspect;
pub mod component;
pub mod engine;
pub mod entity;
pub mod run;
pub mod system;
pub mod systems;
pub mod world;

#[cfg(test)]
mod tests;

pub use aspect::{
    Aspect, AspectEvent, AspectEventKind, AspectId, AspectListener, AspectSpec, FilteredListener,
    ListenerId,
};
pub use component::{Component, ComponentSet, ComponentStore, ComponentType, StoredComponent};
pub use engine::{EcsEngine, EcsError, SystemFailure, SystemId};
pub use entity::{Entity, EntityId};
pub use run::{should_run_system, RunMode, RunOptions};
pub use system::{
    Completion, ForEachEntity, Process, ProcessEntity, System, SystemContext, SystemError,
    SystemFuture,
};
pub use world::{World, WorldError};

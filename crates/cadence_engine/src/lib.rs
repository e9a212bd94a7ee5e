//! # Cadence Engine
//!
//! An entity-component-system core driven by a fixed-timestep game loop with a
//! variable-rate render phase.
//!
//! ## Features
//!
//! - **ECS Architecture**: entities with typed component stores, live aspects
//!   that track `{all, exclude, one_of}` predicates incrementally
//! - **Priority-Ordered Systems**: update-phase and render-phase systems with
//!   three dispatch strategies (default, successive, parallel)
//! - **Fixed Timestep**: accumulator-based update loop with stall clamping and
//!   one render per scheduling callback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadence_engine::prelude::*;
//!
//! struct Position(f64);
//! impl Component for Position {}
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(EngineConfig::default())?;
//!
//!     engine.ecs_mut().world_mut().spawn_with(ComponentSet::new().with(Position(0.0)));
//!     engine.ecs_mut().add_system(
//!         System::from_fn("drift", |ctx, options| {
//!             for entity in ctx.entities() {
//!                 if let Some(position) = ctx.world_mut().get_mut::<Position>(entity) {
//!                     position.0 += options.delta_time;
//!                 }
//!             }
//!             Completion::done()
//!         })
//!         .with_aspect(AspectSpec::new().all::<Position>()),
//!     );
//!
//!     engine.init()?;
//!     engine.run_until_stopped()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod events;
pub mod foundation;
pub mod input;
pub mod render;

mod engine;

pub use engine::{Engine, EngineError, EngineStatus, FrameId, FrameReport, StopHandle};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Engine, EngineError, EngineStatus, FrameId, FrameReport, StopHandle,
        config::{Config, ConfigError, EngineConfig},
        ecs::{
            Aspect, AspectEvent, AspectEventKind, AspectId, AspectListener, AspectSpec,
            Completion, Component, ComponentSet, ComponentType, EcsEngine, EcsError, Entity,
            EntityId, ForEachEntity, Process, ProcessEntity, RunMode, RunOptions, System,
            SystemContext, SystemError, SystemId, World, WorldError,
        },
        events::{Signal, SubscriptionId},
        foundation::time::{Clock, FixedTimestep, ManualClock, MonotonicClock},
        input::{InputSnapshot, InputState, KeyCode},
        render::{NullRenderer, RenderBackend, RenderError},
    };
}

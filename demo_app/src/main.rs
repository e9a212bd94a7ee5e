//! Headless asteroid field demo
//!
//! Spawns a field of drifting, spinning rocks and runs the game loop for a
//! fixed number of frames. Pass a `.toml` or `.ron` file to override the
//! defaults:
//!
//! ```text
//! cadence_demo [config.toml]
//! ```

use cadence_engine::config::Config;
use cadence_engine::ecs::systems::FramerateCounter;
use cadence_engine::foundation::logging;
use cadence_engine::foundation::math::{direction, normalize, Vec2};
use cadence_engine::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::f64::consts::TAU;
use std::rc::Rc;
use thiserror::Error;

/// Demo errors
#[derive(Error, Debug)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Demo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    /// Number of rocks in the initial field
    asteroid_count: usize,
    /// Width and height of the wrapping play field
    field_size: f64,
    /// Maximum rock speed in units per second
    max_speed: f64,
    /// Rocks crumble after this many milliseconds
    lifetime_ms: f64,
    /// Frames to run before stopping
    frames: u32,
    engine: EngineConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            asteroid_count: 32,
            field_size: 800.0,
            max_speed: 120.0,
            lifetime_ms: 2000.0,
            frames: 180,
            engine: EngineConfig::default(),
        }
    }
}

impl Config for DemoConfig {}

impl DemoConfig {
    /// Check value ranges, including the engine section
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("field_size", self.field_size),
            ("max_speed", self.max_speed),
            ("lifetime_ms", self.lifetime_ms),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        if self.frames == 0 {
            return Err(ConfigError::Invalid {
                field: "frames",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.engine.validate()
    }
}

struct Position(Vec2);
impl Component for Position {}

struct Velocity(Vec2);
impl Component for Velocity {}

struct Spin {
    angle: f64,
    rate: f64,
}
impl Component for Spin {}

struct Lifetime(f64);
impl Component for Lifetime {}

/// Moves every entity by its velocity, wrapping around the field edges
struct Movement {
    field_size: f64,
}

impl ProcessEntity for Movement {
    fn process_entity(
        &mut self,
        ctx: &mut SystemContext<'_>,
        entity: EntityId,
        _index: usize,
        _entities: &[EntityId],
        options: &RunOptions,
    ) -> Result<(), SystemError> {
        let velocity = ctx.world().require::<Velocity>(entity)?.0;
        let position = ctx.world_mut().require_mut::<Position>(entity)?;
        let moved = position.0 + velocity * (options.delta_time / 1000.0);
        position.0 = Vec2::new(
            normalize(moved.x, 0.0, self.field_size),
            normalize(moved.y, 0.0, self.field_size),
        );
        Ok(())
    }
}

/// Ages rocks and removes the ones that crumbled
struct Crumble {
    crumbled: Rc<Cell<usize>>,
}

impl ProcessEntity for Crumble {
    fn process_entity(
        &mut self,
        ctx: &mut SystemContext<'_>,
        entity: EntityId,
        _index: usize,
        _entities: &[EntityId],
        options: &RunOptions,
    ) -> Result<(), SystemError> {
        let lifetime = ctx.world_mut().require_mut::<Lifetime>(entity)?;
        lifetime.0 -= options.delta_time;
        if lifetime.0 <= 0.0 {
            ctx.world_mut().remove_entity(entity)?;
            self.crumbled.set(self.crumbled.get() + 1);
        }
        Ok(())
    }
}

fn spawn_field(world: &mut World, config: &DemoConfig, rng: &mut impl Rng) {
    for _ in 0..config.asteroid_count {
        let heading = rng.gen_range(0.0..TAU);
        let speed = rng.gen_range(0.0..config.max_speed);
        let mut components = ComponentSet::new()
            .with(Position(Vec2::new(
                rng.gen_range(0.0..config.field_size),
                rng.gen_range(0.0..config.field_size),
            )))
            .with(Velocity(direction(heading) * speed))
            .with(Spin {
                angle: 0.0,
                rate: rng.gen_range(-TAU..TAU),
            });
        if rng.gen_bool(0.5) {
            components = components.with(Lifetime(rng.gen_range(0.0..config.lifetime_ms)));
        }
        world.spawn_with(components);
    }
    log::info!("Spawned {} asteroids", world.len());
}

fn build_engine(config: &DemoConfig) -> Result<(Engine, Rc<Cell<usize>>), DemoError> {
    let mut engine = Engine::new(config.engine.clone())?;
    spawn_field(engine.ecs_mut().world_mut(), config, &mut rand::thread_rng());

    let crumbled = Rc::new(Cell::new(0));
    let ecs = engine.ecs_mut();
    ecs.add_system(
        System::for_each(
            "movement",
            Movement {
                field_size: config.field_size,
            },
        )
        .with_aspect(AspectSpec::new().all::<Position>().all::<Velocity>()),
    );
    ecs.add_system(
        System::from_fn("spin", |ctx, options| {
            for entity in ctx.entities() {
                if let Some(spin) = ctx.world_mut().get_mut::<Spin>(entity) {
                    spin.angle = normalize(spin.angle + spin.rate * options.delta_time / 1000.0, 0.0, TAU);
                }
            }
            Completion::done()
        })
        .with_aspect(AspectSpec::new().all::<Spin>()),
    );
    ecs.add_system(
        System::for_each(
            "crumble",
            Crumble {
                crumbled: Rc::clone(&crumbled),
            },
        )
        .with_priority(10)
        .with_aspect(AspectSpec::new().all::<Lifetime>()),
    );
    ecs.add_system(FramerateCounter::new(60).into_system());

    Ok((engine, crumbled))
}

fn run(config: &DemoConfig) -> Result<(), DemoError> {
    config.validate()?;
    let (mut engine, crumbled) = build_engine(config)?;

    let stop = engine.stop_handle();
    let frames = Rc::new(Cell::new(0u32));
    let limit = config.frames;
    let counter = Rc::clone(&frames);
    engine.on_render().subscribe(move |_| {
        counter.set(counter.get() + 1);
        if counter.get() >= limit {
            stop.request_stop();
        }
    });
    engine.on_stop().subscribe(|()| log::info!("Shutting down asteroid field"));

    engine.init()?;
    engine.run_until_stopped()?;

    log::info!(
        "Ran {} frames; {} asteroids crumbled, {} remain",
        frames.get(),
        crumbled.get(),
        engine.ecs().world().len()
    );
    Ok(())
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match DemoConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => DemoConfig::default(),
    };
    logging::init_with_level(&config.engine.log_level);

    if let Err(e) = run(&config) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

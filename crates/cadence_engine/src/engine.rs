//! Core engine implementation
//!
//! The [`Engine`] owns the ECS engine and drives it with a fixed-timestep
//! loop: every scheduling callback ([`Engine::frame`]) runs zero or more
//! update passes of `time_step` milliseconds to catch up with the clock,
//! then exactly one render pass with the real elapsed time.

use crate::config::{ConfigError, EngineConfig};
use crate::ecs::{EcsEngine, EcsError, RunMode, RunOptions};
use crate::events::Signal;
use crate::foundation::time::{Clock, FixedTimestep, MonotonicClock};
use crate::input::InputState;
use crate::render::{NullRenderer, RenderBackend, RenderError};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    /// Not initialized, or stopped
    Stopped,
    /// Running updates and renders
    Running,
    /// Rendering without advancing the simulation
    Paused,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        })
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// `init` was called while running or paused
    #[error("Engine is already running (or paused)")]
    AlreadyRunning,

    /// `stop` was called while stopped
    #[error("Engine is already stopped")]
    AlreadyStopped,

    /// The operation needs a running or paused engine
    #[error("Engine is stopped")]
    Stopped,

    /// A system failed
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The rendering backend failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Handle of a scheduled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// What one scheduling callback did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Number of update passes
    pub updates: u32,
    /// Delta time handed to each update pass
    pub update_delta: f64,
    /// Delta time handed to the render pass
    pub render_delta: f64,
    /// Whether the elapsed time was clamped as a stall
    pub stalled: bool,
    /// Whether the engine was paused during the frame
    pub paused: bool,
}

/// Shared flag requesting the engine to stop at the end of the current frame
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    /// Ask the engine to stop
    pub fn request_stop(&self) {
        self.0.set(true);
    }

    /// Whether a stop has been requested
    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Main engine struct
///
/// The engine coordinates the ECS, the rendering backend and input, and runs
/// the game loop.
pub struct Engine {
    status: EngineStatus,
    config: EngineConfig,
    ecs: EcsEngine,
    renderer: Box<dyn RenderBackend>,
    input: InputState,
    clock: Box<dyn Clock>,
    timestep: FixedTimestep,
    on_init: Signal<()>,
    on_stop: Signal<()>,
    on_update: Signal<f64>,
    on_render: Signal<f64>,
    next_frame: Option<FrameId>,
    frames_scheduled: u64,
    stop_request: StopHandle,
}

impl Engine {
    /// Create a stopped engine with a headless renderer and a monotonic clock
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let timestep = FixedTimestep::with_limits(config.time_step_ms, config.max_frame_time_ms, config.stall_factor);
        Ok(Self {
            status: EngineStatus::Stopped,
            ecs: EcsEngine::new()?,
            renderer: Box::new(NullRenderer::new()),
            input: InputState::new(),
            clock: Box::new(MonotonicClock::new()),
            timestep,
            config,
            on_init: Signal::new(),
            on_stop: Signal::new(),
            on_update: Signal::new(),
            on_render: Signal::new(),
            next_frame: None,
            frames_scheduled: 0,
            stop_request: StopHandle::default(),
        })
    }

    /// Replace the rendering backend (builder pattern)
    pub fn with_renderer(mut self, renderer: impl RenderBackend + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Replace the time source (builder pattern)
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current lifecycle state
    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fixed update step in milliseconds
    pub fn time_step(&self) -> f64 {
        self.timestep.time_step()
    }

    /// The update accumulator
    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    /// The ECS engine
    pub fn ecs(&self) -> &EcsEngine {
        &self.ecs
    }

    /// Mutable access to the ECS engine
    pub fn ecs_mut(&mut self) -> &mut EcsEngine {
        &mut self.ecs
    }

    /// Input state
    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Mutable input state, fed by the host
    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Signal dispatched after the engine started
    pub fn on_init(&mut self) -> &mut Signal<()> {
        &mut self.on_init
    }

    /// Signal dispatched before the engine stops
    pub fn on_stop(&mut self) -> &mut Signal<()> {
        &mut self.on_stop
    }

    /// Signal dispatched before every update pass, with the update delta
    pub fn on_update(&mut self) -> &mut Signal<f64> {
        &mut self.on_update
    }

    /// Signal dispatched before every render pass, with the render delta
    pub fn on_render(&mut self) -> &mut Signal<f64> {
        &mut self.on_render
    }

    /// Handle for requesting a stop from systems or subscribers
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_request.clone()
    }

    /// The pending scheduling callback, if any
    pub fn next_frame(&self) -> Option<FrameId> {
        self.next_frame
    }

    /// Start the engine.
    ///
    /// Initializes the renderer and waits for its resources before switching
    /// to running. On failure the engine stays stopped.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.status != EngineStatus::Stopped {
            return Err(EngineError::AlreadyRunning);
        }

        self.renderer.init()?;
        let renderer = &mut self.renderer;
        self.ecs.block_on(renderer.load())?;

        self.status = EngineStatus::Running;
        self.stop_request.take();
        log::info!("Engine started (time step {:.3}ms)", self.timestep.time_step());
        self.on_init.dispatch(());

        self.timestep.reset(self.clock.now_ms());
        self.schedule_frame();
        Ok(())
    }

    /// Stop the engine; the pending frame is cancelled
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if self.status == EngineStatus::Stopped {
            return Err(EngineError::AlreadyStopped);
        }

        self.on_stop.dispatch(());
        self.status = EngineStatus::Stopped;
        self.next_frame = None;
        log::info!("Engine stopped");
        Ok(())
    }

    /// Pause or resume; setting the current state again is a no-op
    pub fn set_paused(&mut self, paused: bool) -> Result<(), EngineError> {
        if self.status == EngineStatus::Stopped {
            return Err(EngineError::Stopped);
        }

        let status = if paused { EngineStatus::Paused } else { EngineStatus::Running };
        if status != self.status {
            log::info!("Engine {status}");
            self.status = status;
        }
        Ok(())
    }

    /// Run the systems once with explicit options
    pub fn run(&mut self, options: impl Into<Option<RunOptions>>, mode: RunMode) -> Result<(), EngineError> {
        self.ecs.run(options, mode)?;
        Ok(())
    }

    /// One scheduling callback at `current_time` milliseconds.
    ///
    /// Errors abort the remaining passes of the frame, leaving the steps that
    /// did not run in the accumulator; the next frame is still scheduled unless
    /// the engine stopped. Queued aspect events are delivered before the render
    /// pass, paused or not.
    pub fn frame(&mut self, current_time: f64) -> Result<FrameReport, EngineError> {
        if self.status == EngineStatus::Stopped || self.next_frame.take().is_none() {
            return Err(EngineError::Stopped);
        }

        let result = self.step(current_time);

        if self.stop_request.take() && self.status != EngineStatus::Stopped {
            self.stop()?;
        }
        if self.status != EngineStatus::Stopped {
            self.schedule_frame();
        }
        result
    }

    fn step(&mut self, current_time: f64) -> Result<FrameReport, EngineError> {
        let time_step = self.timestep.time_step();
        self.ecs.set_input(self.input.snapshot());

        let report = if self.status == EngineStatus::Paused {
            let elapsed = self.timestep.skip_to(current_time);
            FrameReport {
                updates: 0,
                update_delta: time_step,
                render_delta: elapsed,
                stalled: false,
                paused: true,
            }
        } else {
            let credit = self.timestep.credit(current_time);
            let mut updates = 0;
            while self.timestep.consume_step() {
                self.update(time_step)?;
                updates += 1;
            }
            FrameReport {
                updates,
                update_delta: time_step,
                render_delta: credit.elapsed,
                stalled: credit.stalled,
                paused: false,
            }
        };

        self.ecs.flush_events();
        self.render(report.render_delta)?;
        log::trace!("Frame: {} updates, render delta {:.2}ms", report.updates, report.render_delta);
        Ok(report)
    }

    fn update(&mut self, delta_time: f64) -> Result<(), EngineError> {
        self.on_update.dispatch(delta_time);
        self.ecs.run(RunOptions::update(delta_time), self.config.update_mode)?;
        self.input.end_update();
        self.ecs.set_input(self.input.snapshot());
        Ok(())
    }

    fn render(&mut self, delta_time: f64) -> Result<(), EngineError> {
        self.on_render.dispatch(delta_time);
        self.ecs.run(RunOptions::render(delta_time), self.config.render_mode)?;
        self.renderer.render(delta_time)?;
        self.input.end_render();
        Ok(())
    }

    fn schedule_frame(&mut self) {
        self.frames_scheduled += 1;
        self.next_frame = Some(FrameId(self.frames_scheduled));
    }

    /// Drive frames from the engine clock until the engine stops.
    ///
    /// Sleeps for the configured frame interval between frames. The first
    /// error is returned with the engine still running.
    pub fn run_until_stopped(&mut self) -> Result<(), EngineError> {
        if self.status == EngineStatus::Stopped {
            return Err(EngineError::Stopped);
        }

        let interval = Duration::from_secs_f64(self.config.frame_interval_ms() / 1000.0);
        while self.next_frame.is_some() {
            let now = self.clock.now_ms();
            self.frame(now)?;
            if self.next_frame.is_some() {
                std::thread::sleep(interval);
            }
        }

        self.ecs.settle_detached();
        log::info!("Game loop finished");
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status)
            .field("ecs", &self.ecs)
            .field("timestep", &self.timestep)
            .field("next_frame", &self.next_frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{
        AspectEvent, AspectEventKind, AspectSpec, Completion, Component, ComponentSet, Process, System,
        SystemContext, SystemError,
    };
    use crate::foundation::time::ManualClock;
    use crate::input::KeyCode;
    use crate::render::{BackendResult, LoadFuture};
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    #[derive(Default)]
    struct Probe {
        log: Log,
        fail_init: bool,
        fail_load: bool,
    }

    impl RenderBackend for Probe {
        fn init(&mut self) -> BackendResult<()> {
            self.log.borrow_mut().push("init".to_string());
            if self.fail_init {
                return Err(RenderError::InitializationFailed("no surface".to_string()));
            }
            Ok(())
        }

        fn load(&mut self) -> LoadFuture<'_> {
            let log = Rc::clone(&self.log);
            let fail = self.fail_load;
            Box::pin(async move {
                tokio::task::yield_now().await;
                log.borrow_mut().push("load".to_string());
                if fail {
                    Err(RenderError::LoadFailed("missing atlas".to_string()))
                } else {
                    Ok(())
                }
            })
        }

        fn render(&mut self, delta_time: f64) -> BackendResult<()> {
            self.log.borrow_mut().push(format!("draw:{delta_time}"));
            Ok(())
        }
    }

    fn engine_with(time_step: f64, probe: Probe, clock: &ManualClock) -> Engine {
        Engine::new(EngineConfig::default().with_time_step(time_step))
            .unwrap()
            .with_renderer(probe)
            .with_clock(clock.clone())
    }

    fn record_phases(engine: &mut Engine, log: &Log) {
        let updates = Rc::clone(log);
        engine
            .on_update()
            .subscribe(move |dt| updates.borrow_mut().push(format!("update:{dt}")));
        let renders = Rc::clone(log);
        engine
            .on_render()
            .subscribe(move |dt| renders.borrow_mut().push(format!("render:{dt}")));
    }

    #[test]
    fn test_initial_state() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert_ne!(engine.time_step(), 0.0);
        assert!(engine.next_frame().is_none());
        assert_eq!(engine.on_init().count(), 0);
        assert_eq!(engine.on_stop().count(), 0);
        assert_eq!(engine.on_update().count(), 0);
        assert_eq!(engine.on_render().count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Engine::new(EngineConfig::default().with_time_step(-1.0));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_init_prepares_renderer_then_notifies() {
        let log = Log::default();
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe { log: Rc::clone(&log), ..Probe::default() }, &clock);
        let sink = Rc::clone(&log);
        engine.on_init().subscribe(move |()| sink.borrow_mut().push("on_init".to_string()));

        engine.init().unwrap();

        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(engine.next_frame().is_some());
        assert_eq!(*log.borrow(), ["init", "load", "on_init"]);
    }

    #[test]
    fn test_failed_init_leaves_engine_stopped() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe { fail_init: true, ..Probe::default() }, &clock);
        assert!(matches!(engine.init(), Err(EngineError::Render(RenderError::InitializationFailed(_)))));
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert!(engine.next_frame().is_none());

        let mut engine = engine_with(33.0, Probe { fail_load: true, ..Probe::default() }, &clock);
        assert!(matches!(engine.init(), Err(EngineError::Render(RenderError::LoadFailed(_)))));
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();

        engine.init().unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(matches!(engine.init(), Err(EngineError::AlreadyRunning)));
        assert_eq!(engine.status(), EngineStatus::Running);

        engine.set_paused(true).unwrap();
        assert_eq!(engine.status(), EngineStatus::Paused);
        assert!(matches!(engine.init(), Err(EngineError::AlreadyRunning)));
        engine.set_paused(false).unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);

        engine.stop().unwrap();
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert!(matches!(engine.stop(), Err(EngineError::AlreadyStopped)));
        assert!(matches!(engine.set_paused(true), Err(EngineError::Stopped)));
        assert!(matches!(engine.set_paused(false), Err(EngineError::Stopped)));
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn test_set_paused_is_idempotent() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.init().unwrap();

        engine.set_paused(true).unwrap();
        engine.set_paused(true).unwrap();
        assert_eq!(engine.status(), EngineStatus::Paused);

        engine.set_paused(false).unwrap();
        engine.set_paused(false).unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
    }

    #[test]
    fn test_stop_notifies_and_cancels_next_frame() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let stops = Rc::new(Cell::new(0));
        let sink = Rc::clone(&stops);
        engine.on_stop().subscribe(move |()| sink.set(sink.get() + 1));

        engine.init().unwrap();
        engine.stop().unwrap();

        assert_eq!(stops.get(), 1);
        assert!(engine.next_frame().is_none());
        assert!(matches!(engine.frame(100.0), Err(EngineError::Stopped)));
    }

    #[test]
    fn test_catch_up_updates_then_single_render() {
        let log = Log::default();
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe { log: Rc::clone(&log), ..Probe::default() }, &clock);
        engine.init().unwrap();
        record_phases(&mut engine, &log);
        log.borrow_mut().clear();

        let report = engine.frame(100.0).unwrap();

        assert_eq!(report.updates, 3);
        assert_relative_eq!(report.render_delta, 100.0);
        assert_eq!(*log.borrow(), ["update:33", "update:33", "update:33", "render:100", "draw:100"]);
        assert!(engine.next_frame().is_some());
    }

    #[test]
    fn test_stall_runs_one_update() {
        let log = Log::default();
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe::default(), &clock);
        engine.init().unwrap();
        record_phases(&mut engine, &log);

        let report = engine.frame(500.0).unwrap();

        assert!(report.stalled);
        assert_eq!(report.updates, 1);
        assert_eq!(*log.borrow(), ["update:33", "render:33"]);
    }

    #[test]
    fn test_systems_run_in_their_phase() {
        let log = Log::default();
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);

        for (name, render) in [("physics", false), ("sprites", true)] {
            let sink = Rc::clone(&log);
            let system = System::from_fn(name, move |_, options| {
                sink.borrow_mut().push(format!("{name}:{}", options.delta_time));
                Completion::done()
            });
            engine
                .ecs_mut()
                .add_system(if render { system.render_system() } else { system });
        }

        engine.init().unwrap();
        engine.frame(25.0).unwrap();

        assert_eq!(*log.borrow(), ["physics:10", "physics:10", "sprites:25"]);
    }

    #[test]
    fn test_paused_frames_render_without_catch_up() {
        let log = Log::default();
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe::default(), &clock);
        engine.init().unwrap();
        record_phases(&mut engine, &log);

        engine.set_paused(true).unwrap();
        let report = engine.frame(300.0).unwrap();
        assert!(report.paused);
        assert_eq!(report.updates, 0);
        assert_eq!(*log.borrow(), ["render:300"]);

        engine.set_paused(false).unwrap();
        log.borrow_mut().clear();
        let report = engine.frame(333.0).unwrap();
        assert_eq!(report.updates, 1);
        assert_eq!(*log.borrow(), ["update:33", "render:33"]);
    }

    #[test]
    fn test_stop_handle_ends_loop_after_current_frame() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);
        let stop = engine.stop_handle();
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        engine.ecs_mut().add_system(
            System::from_fn("quit_after_two", move |_, _| {
                counter.set(counter.get() + 1);
                if counter.get() == 2 {
                    stop.request_stop();
                }
                Completion::done()
            })
            .render_system(),
        );

        engine.init().unwrap();
        engine.frame(10.0).unwrap();
        assert_eq!(engine.status(), EngineStatus::Running);
        engine.frame(20.0).unwrap();

        assert_eq!(renders.get(), 2);
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert!(engine.next_frame().is_none());
    }

    #[test]
    fn test_system_failure_propagates_and_loop_survives() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);
        engine.ecs_mut().add_system(System::from_fn("broken", |_, _| {
            Completion::failed(SystemError::failed("boom"))
        }));

        engine.init().unwrap();
        let error = engine.frame(10.0).unwrap_err();

        assert!(matches!(error, EngineError::Ecs(EcsError::SystemFailed(ref f)) if f.system == "broken"));
        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(engine.next_frame().is_some());
    }

    #[test]
    fn test_failed_update_keeps_remaining_steps() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(33.0, Probe::default(), &clock);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        engine.ecs_mut().add_system(System::from_fn("flaky", move |_, _| {
            counter.set(counter.get() + 1);
            if counter.get() == 2 {
                Completion::failed(SystemError::failed("second update"))
            } else {
                Completion::done()
            }
        }));

        engine.init().unwrap();
        assert!(engine.frame(100.0).is_err());

        assert_eq!(calls.get(), 2);
        assert_relative_eq!(engine.timestep().accumulator(), 34.0);

        let report = engine.frame(100.0).unwrap();
        assert_eq!(report.updates, 1);
        assert_eq!(calls.get(), 3);
        assert_relative_eq!(engine.timestep().accumulator(), 1.0);
    }

    #[test]
    fn test_aspect_events_delivered_every_frame_while_paused() {
        struct Marker;
        impl Component for Marker {}

        struct Watcher {
            seen: Rc<Cell<usize>>,
        }

        impl Process for Watcher {
            fn process(&mut self, _ctx: &mut SystemContext<'_>, _options: &RunOptions) -> Completion {
                Completion::done()
            }

            fn interests(&self) -> AspectEventKind {
                AspectEventKind::ENTITIES_ADDED
            }

            fn on_aspect_event(&mut self, _event: &AspectEvent) {
                self.seen.set(self.seen.get() + 1);
            }
        }

        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);
        let seen = Rc::new(Cell::new(0));
        engine.ecs_mut().add_system(
            System::new("watcher", Watcher { seen: Rc::clone(&seen) })
                .with_aspect(AspectSpec::new().all::<Marker>()),
        );

        engine.init().unwrap();
        engine.set_paused(true).unwrap();
        for frame in 1..=5u32 {
            engine.ecs_mut().world_mut().spawn_with(ComponentSet::new().with(Marker));
            let report = engine.frame(f64::from(frame) * 10.0).unwrap();
            assert_eq!(report.updates, 0);
            assert_eq!(seen.get(), frame as usize);
        }

        engine.set_paused(false).unwrap();
        engine.frame(60.0).unwrap();
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn test_systems_see_frame_input() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);
        engine.input_mut().register_default_bindings().unwrap();
        let fired = Rc::new(Cell::new(false));
        let sink = Rc::clone(&fired);
        engine.ecs_mut().add_system(System::from_fn("trigger", move |ctx, _| {
            sink.set(ctx.input().is_down("fire"));
            Completion::done()
        }));

        engine.init().unwrap();
        engine.input_mut().handle_key(KeyCode::Mouse1, true);
        engine.frame(10.0).unwrap();

        assert!(fired.get());
    }

    #[test]
    fn test_scroll_resets_after_update_and_movement_after_render() {
        let clock = ManualClock::new(0.0);
        let mut engine = engine_with(10.0, Probe::default(), &clock);
        engine.init().unwrap();
        engine.input_mut().handle_wheel(0.0, 2.0);
        engine.input_mut().handle_cursor_move(5.0, 5.0, 1.0, 1.0);

        engine.frame(10.0).unwrap();

        assert_relative_eq!(engine.input().cursor().scroll_y, 0.0);
        assert_relative_eq!(engine.input().cursor().dx, 0.0);
        assert_relative_eq!(engine.input().cursor().x, 5.0);
    }

    #[test]
    fn test_run_until_stopped_drives_frames() {
        let config = EngineConfig {
            target_fps: 1000,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config).unwrap();
        let stop = engine.stop_handle();
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        engine.on_render().subscribe(move |_| {
            counter.set(counter.get() + 1);
            if counter.get() == 3 {
                stop.request_stop();
            }
        });

        assert!(matches!(engine.run_until_stopped(), Err(EngineError::Stopped)));
        engine.init().unwrap();
        engine.run_until_stopped().unwrap();

        assert_eq!(renders.get(), 3);
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }
}

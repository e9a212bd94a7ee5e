//! Frame rate counter render system

use crate::ecs::run::RunOptions;
use crate::ecs::system::{Completion, Process, System, SystemContext};
use std::cell::Cell;
use std::rc::Rc;

/// Shared handle to the latest frames-per-second value
#[derive(Debug, Clone, Default)]
pub struct FramerateReading(Rc<Cell<Option<u32>>>);

impl FramerateReading {
    /// Latest measurement, `None` before the first render pass
    pub fn get(&self) -> Option<u32> {
        self.0.get()
    }
}

/// Render system computing `round(1000 / delta_time)` every render pass
#[derive(Debug)]
pub struct FramerateCounter {
    reading: FramerateReading,
    frames: u64,
    log_interval: u64,
}

impl FramerateCounter {
    /// Create a counter that logs every `log_interval` frames (0 disables logging)
    pub fn new(log_interval: u64) -> Self {
        Self {
            reading: FramerateReading::default(),
            frames: 0,
            log_interval,
        }
    }

    /// Handle for reading the value after the counter has been added to an engine
    pub fn reading(&self) -> FramerateReading {
        self.reading.clone()
    }

    /// Wrap the counter in a render-phase system
    pub fn into_system(self) -> System {
        System::new("framerate_counter", self).render_system()
    }

    fn measure(delta_time: f64) -> Option<u32> {
        if delta_time <= 0.0 || !delta_time.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some((1000.0 / delta_time).round() as u32)
    }
}

impl Default for FramerateCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Process for FramerateCounter {
    fn process(&mut self, _ctx: &mut SystemContext<'_>, options: &RunOptions) -> Completion {
        let Some(fps) = Self::measure(options.delta_time) else {
            return Completion::done();
        };
        self.reading.0.set(Some(fps));
        self.frames += 1;
        if self.log_interval > 0 && self.frames % self.log_interval == 0 {
            log::debug!("FPS {fps}");
        }
        Completion::done()
    }
}

//! Run options and dispatch modes for a pass over the systems

use serde::{Deserialize, Serialize};

/// Parameters of one pass over the registered systems
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunOptions {
    /// Elapsed time since the previous pass of the same phase, in milliseconds
    pub delta_time: f64,
    /// `Some(true)` selects render systems; anything else selects update systems
    pub is_rendering: Option<bool>,
}

impl RunOptions {
    /// Options for an update pass
    pub fn update(delta_time: f64) -> Self {
        Self {
            delta_time,
            is_rendering: Some(false),
        }
    }

    /// Options for a render pass
    pub fn render(delta_time: f64) -> Self {
        Self {
            delta_time,
            is_rendering: Some(true),
        }
    }

    /// Whether these options select the render phase
    pub fn is_render_pass(&self) -> bool {
        self.is_rendering == Some(true)
    }
}

/// How a pass invokes its systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Invoke in order; synchronous failures abort the pass, pending work is
    /// not awaited
    #[default]
    Default,
    /// Invoke in order, waiting for each system to finish before the next
    Successive,
    /// Start every system in order, then wait for all of them together
    Parallel,
}

/// Whether a system takes part in a pass.
///
/// Render systems run only when rendering is explicitly requested. Update
/// systems run whenever it is not, including when no options are given.
pub fn should_run_system(options: Option<&RunOptions>, is_render_system: bool) -> bool {
    let rendering = options.is_some_and(RunOptions::is_render_pass);
    rendering == is_render_system
}

//! Built-in systems

pub mod framerate;

pub use framerate::{FramerateCounter, FramerateReading};

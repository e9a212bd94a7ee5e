//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and angle helpers
//! - Clocks and the fixed-timestep accumulator
//! - Logging initialisation

pub mod logging;
pub mod math;
pub mod time;

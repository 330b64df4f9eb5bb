//! Prism Core
//!
//! Shared building blocks for the Prism renderer crates: logging setup,
//! profiling macros, math re-exports and allocation helpers.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;

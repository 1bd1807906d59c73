//! Schema module - Configuration and payload types for search runs.

mod config;
mod sample;

pub use config::*;
pub use sample::*;

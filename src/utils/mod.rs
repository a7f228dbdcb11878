//! Utility modules shared across the build pipeline.

pub mod date;
pub mod exec;
pub mod front_matter;
pub mod log;
pub mod pattern;
pub mod tree;

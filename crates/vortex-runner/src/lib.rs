//! Command-line runner and mock engine for the vortex dispatch core.

pub mod cli;
pub mod engine;

pub use engine::{LambOseen, MockEngine};

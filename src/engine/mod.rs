//! Orchestration engine for hoist
//!
//! The engine drives remote changes for selected app environments:
//! 1. Executing - Fan out over environments with failure isolation
//! 2. Syncing - Apply per-category deltas to one remote app
//! 3. Deploying - Walk one environment through the deploy stages with hooks

pub mod executor;
pub mod hooks;
pub mod pipeline;
pub mod sync;

pub use executor::{BackendFactory, DEFAULT_JOBS, EnvOutcome, Executor, RunReport};

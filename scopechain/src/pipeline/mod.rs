//! Pipeline building and execution.
//!
//! This module provides:
//! - The per-request runner and its phase state machine
//! - A pipeline builder with registration checks
//! - JSON configuration for pipelines and logging

mod builder;
mod config;
mod phase;
mod runner;


pub use builder::PipelineBuilder;
pub use config::{LogConfig, PipelineConfig};
pub use phase::RunPhase;
pub use runner::Pipeline;

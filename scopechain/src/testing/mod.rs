//! Testing utilities for scoped pipelines.
//!
//! This module provides:
//! - A shared journal that probes record into
//! - Recording, failing and short-circuiting stages
//! - Registration helpers for the root container

mod journal;
mod stages;

pub use journal::{DisposeProbe, Journal, ProbeAction, ProbeEntry};
pub use stages::{
    register_failing, register_per_request_probe, register_recording, register_short_circuit,
    FailingStage, RecordingStage, ShortCircuitStage,
};

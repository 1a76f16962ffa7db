//! # Scopechain
//!
//! Per-request middleware chaining over hierarchical, scoped dependency
//! resolution.
//!
//! Scopechain provides:
//!
//! - **Resolution scopes**: a tree of scopes with shadowed, parent-fallback lookups
//! - **Per-request isolation**: every request gets its own scope and shared state
//! - **Stage Scope chaining**: each stage is resolved in its own nested scope
//!   with an immutable handle to its successor
//! - **Deterministic teardown**: scopes are disposed in exact reverse order of
//!   creation, on success and on failure
//! - **Event-driven observability**: lifecycle events for every scope and run phase
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scopechain::prelude::*;
//!
//! let mut builder = RootContainer::builder();
//! register_greeting_stages(&mut builder)?;
//! let container = Arc::new(builder.build());
//!
//! let pipeline = Pipeline::builder("hello")
//!     .container(container)
//!     .stage(GREET)
//!     .stage(ECHO)
//!     .build()?;
//!
//! let request = Arc::new(RequestContext::new("GET", "/"));
//! pipeline.handle(request.clone()).await?;
//! assert_eq!(request.response().body(), "hello");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod scope;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{ItemBag, RequestContext, ResponseWriter};
    pub use crate::errors::{
        ConfigError, DuplicateBindingError, LifecycleViolation, PipelineError, ScopeError,
        ScopeLifecycleError, UnresolvedBindingError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LifecycleEvent, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{LogConfig, Pipeline, PipelineBuilder, PipelineConfig, RunPhase};
    pub use crate::scope::{
        Binding, BindingKey, Component, ContainerBuilder, Dispose, Instance, Lifetime,
        RequestScope, RootContainer, Scope, ScopeTag,
    };
    pub use crate::stages::{
        register_greeting_stages, Dispatch, Middleware, Outcome, StageKind, ECHO, GREET,
    };
}

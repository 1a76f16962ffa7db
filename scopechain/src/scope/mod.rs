//! Hierarchical, scoped dependency resolution.
//!
//! This module provides:
//! - A tree of resolution scopes with shadowed, parent-fallback lookups
//! - A tagged binding registry (stage kinds, next handle, carrier, services)
//! - The immutable root container built at process start
//! - The per-request scope that anchors one request's resolution tree
//!
//! ```text
//! root ──> request ──> stage:first ──> stage:first ──> stage:last
//!          (carrier)   (next)          (next)          (next = sentinel)
//! ```

mod binding;
mod container;
mod identity;
mod request;
mod resolution;
#[cfg(test)]
mod scope_tests;

pub use binding::{Binding, BindingKey, Component, Dispose, Factory, Instance, Lifetime};
pub use container::{ContainerBuilder, RootContainer};
pub use identity::ScopeTag;
pub use request::RequestScope;
pub use resolution::{Ancestors, Scope};

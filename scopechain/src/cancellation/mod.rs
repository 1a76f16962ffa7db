//! Cooperative cancellation of in-flight requests.
//!
//! The host cancels a request through a [`CancellationToken`]; stages observe
//! it via [`Dispatch::ensure_active`](crate::stages::Dispatch::ensure_active)
//! and the pipeline checks it before dispatching.

mod token;

pub use token::{CancelCallback, CancellationToken};

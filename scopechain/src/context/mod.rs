//! The host-facing request carrier.
//!
//! This module provides:
//! - `RequestContext`, the object the host hands to the pipeline per request
//! - A response writer stages use to produce output
//! - A key-value item store for host-level annotations

mod items;
mod request;

pub use items::ItemBag;
pub use request::{RequestContext, ResponseWriter};

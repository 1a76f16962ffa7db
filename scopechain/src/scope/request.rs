//! The per-request scope.

use super::{Binding, BindingKey, Scope, ScopeTag};
use crate::context::RequestContext;
use crate::errors::ScopeError;
use std::ops::Deref;
use std::sync::Arc;
use tracing::error;

/// The scope that anchors one request's resolution tree.
///
/// It is opened under the root with the request carrier pre-registered,
/// and [`finish`](Self::finish) is the outermost disposal boundary of the
/// request. `finish` consumes the scope, so it cannot be called while a
/// Stage Scope still borrows it.
pub struct RequestScope<'r> {
    scope: Scope<'r>,
    request: Arc<RequestContext>,
}

impl<'r> RequestScope<'r> {
    /// Opens a Request Scope under `root`.
    ///
    /// # Errors
    ///
    /// Fails if `root` has been disposed.
    pub fn open(root: &'r Scope<'r>, request: Arc<RequestContext>) -> Result<Self, ScopeError> {
        let carrier = request.clone();
        let scope = root.open_child_for(ScopeTag::Request, Some(request.request_id()), |scope| {
            scope.register(BindingKey::Carrier, Binding::service(carrier))?;
            Ok(())
        })?;
        Ok(Self { scope, request })
    }

    /// Returns the request carried by this scope.
    #[must_use]
    pub fn request(&self) -> &Arc<RequestContext> {
        &self.request
    }

    /// Returns the underlying scope.
    #[must_use]
    pub fn scope(&self) -> &Scope<'r> {
        &self.scope
    }

    /// Disposes the request's resolution tree.
    ///
    /// A Stage Scope that was dropped without disposal surfaces here as a
    /// fatal [`LifecycleViolation::LeakedChildren`](crate::errors::LifecycleViolation).
    ///
    /// # Errors
    ///
    /// Returns the lifecycle error raised by disposal.
    pub fn finish(self) -> Result<(), ScopeError> {
        let result = self.scope.dispose();
        if let Err(err) = &result {
            error!(request_id = %self.request.request_id(), error = %err, "Request scope teardown failed");
        }
        result
    }
}

impl<'r> Deref for RequestScope<'r> {
    type Target = Scope<'r>;

    fn deref(&self) -> &Self::Target {
        &self.scope
    }
}

//! The root container.

use super::{Binding, BindingKey, Component, RequestScope, Scope};
use crate::context::RequestContext;
use crate::errors::ScopeError;
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{Middleware, StageKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Collects the static registrations of the root container.
pub struct ContainerBuilder {
    root: Scope<'static>,
    stage_kinds: BTreeMap<&'static str, StageKind>,
}

impl ContainerBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Scope::root(Arc::new(NoOpEventSink)),
            stage_kinds: BTreeMap::new(),
        }
    }

    /// Sets the sink that every scope of this container reports to.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.root.set_event_sink(sink);
        self
    }

    /// Registers a raw binding.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the key is already registered.
    pub fn register(&mut self, key: BindingKey, binding: Binding) -> Result<&mut Self, ScopeError> {
        self.root.register(key, binding)?;
        if let BindingKey::Stage(kind) = key {
            self.stage_kinds.insert(kind.name(), kind);
        }
        Ok(self)
    }

    /// Registers the factory for a stage kind.
    ///
    /// The factory runs inside the Stage Scope, where [`Scope::next_stage`]
    /// yields the stage's successor.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the kind is already registered.
    pub fn register_stage<F>(&mut self, kind: StageKind, factory: F) -> Result<&mut Self, ScopeError>
    where
        F: Fn(&Scope<'_>) -> Result<Arc<dyn Middleware>, ScopeError> + Send + Sync + 'static,
    {
        self.register(
            BindingKey::Stage(kind),
            Binding::factory(move |scope| factory(scope).map(Component::stage)),
        )
    }

    /// Registers a stage factory that returns a full component, so the
    /// stage can be disposed with its Stage Scope.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the kind is already registered.
    pub fn register_stage_component<F>(
        &mut self,
        kind: StageKind,
        factory: F,
    ) -> Result<&mut Self, ScopeError>
    where
        F: Fn(&Scope<'_>) -> Result<Component, ScopeError> + Send + Sync + 'static,
    {
        self.register(BindingKey::Stage(kind), Binding::factory(factory))
    }

    /// Registers a process-wide service instance.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the name is already registered.
    pub fn register_service<T: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        value: Arc<T>,
    ) -> Result<&mut Self, ScopeError> {
        self.register(BindingKey::Service(name), Binding::service(value))
    }

    /// Registers a service activated once per request and shared by every
    /// stage of that request.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the name is already registered.
    pub fn register_per_request<T, F>(
        &mut self,
        name: &'static str,
        factory: F,
    ) -> Result<&mut Self, ScopeError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope<'_>) -> Result<Arc<T>, ScopeError> + Send + Sync + 'static,
    {
        self.register(
            BindingKey::Service(name),
            Binding::per_request(move |scope| factory(scope).map(Component::service)),
        )
    }

    /// Registers a per-request service that returns a full component.
    ///
    /// # Errors
    ///
    /// Returns a duplicate binding error if the name is already registered.
    pub fn register_per_request_component<F>(
        &mut self,
        name: &'static str,
        factory: F,
    ) -> Result<&mut Self, ScopeError>
    where
        F: Fn(&Scope<'_>) -> Result<Component, ScopeError> + Send + Sync + 'static,
    {
        self.register(BindingKey::Service(name), Binding::per_request(factory))
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> RootContainer {
        RootContainer {
            root: self.root,
            stage_kinds: self.stage_kinds,
        }
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("root", &self.root)
            .field("stage_kinds", &self.stage_kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The top-level resolution scope, immutable once built.
///
/// The container is shared by every in-flight request. It only hands out
/// `&Scope`, so no binding can be added after [`ContainerBuilder::build`].
pub struct RootContainer {
    root: Scope<'static>,
    stage_kinds: BTreeMap<&'static str, StageKind>,
}

impl RootContainer {
    /// Creates a new container builder.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Returns the root scope.
    #[must_use]
    pub fn scope(&self) -> &Scope<'static> {
        &self.root
    }

    /// Returns the sink every scope of this container reports to.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        self.root.event_sink()
    }

    /// Looks up a registered stage kind by name.
    #[must_use]
    pub fn stage_kind(&self, name: &str) -> Option<StageKind> {
        self.stage_kinds.get(name).copied()
    }

    /// Returns true if a factory is registered for the kind.
    #[must_use]
    pub fn has_stage(&self, kind: StageKind) -> bool {
        self.root.has_local(&BindingKey::Stage(kind))
    }

    /// Returns the registered stage kinds, sorted by name.
    #[must_use]
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stage_kinds.values().copied().collect()
    }

    /// Opens the Request Scope for one request.
    ///
    /// # Errors
    ///
    /// Fails if the container has been disposed.
    pub fn begin_request(&self, request: Arc<RequestContext>) -> Result<RequestScope<'_>, ScopeError> {
        RequestScope::open(&self.root, request)
    }

    /// Releases instances owned by the root, at process shutdown.
    ///
    /// # Errors
    ///
    /// Fails if a request is still in flight or a request scope leaked.
    pub fn dispose(&self) -> Result<(), ScopeError> {
        self.root.dispose()
    }
}

impl fmt::Debug for RootContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContainer")
            .field("root", &self.root)
            .field("stage_kinds", &self.stage_kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

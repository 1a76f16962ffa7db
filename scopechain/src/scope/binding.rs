//! Binding keys, bindings, and the instances they produce.

use super::{Scope, ScopeTag};
use crate::errors::ScopeError;
use crate::stages::{Middleware, StageKind};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The capability of releasing resources when the owning scope is disposed.
pub trait Dispose: Send + Sync {
    /// Releases the instance's resources. Called at most once per owning scope.
    fn dispose(&self);
}

/// A lookup key in the binding registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKey {
    /// The factory for a stage kind.
    Stage(StageKind),
    /// The successor handle of the stage being resolved.
    Next,
    /// The inbound request carrier.
    Carrier,
    /// An application service, by name.
    Service(&'static str),
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(kind) => write!(f, "stage:{kind}"),
            Self::Next => f.write_str("next"),
            Self::Carrier => f.write_str("carrier"),
            Self::Service(name) => write!(f, "service:{name}"),
        }
    }
}

/// A resolved instance.
#[derive(Clone)]
pub enum Instance {
    /// A pipeline stage.
    Stage(Arc<dyn Middleware>),
    /// Any other shared value.
    Service(Arc<dyn Any + Send + Sync>),
}

impl Instance {
    /// Wraps a service value.
    pub fn service<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::Service(value)
    }

    /// Returns the stage, if this instance is one.
    #[must_use]
    pub fn as_stage(&self) -> Option<&Arc<dyn Middleware>> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Service(_) => None,
        }
    }

    /// Downcasts a service instance to a concrete type.
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            Self::Service(value) => value.clone().downcast::<T>().ok(),
            Self::Stage(_) => None,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => f.debug_tuple("Stage").field(stage).finish(),
            Self::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// What a factory produces: an instance and, optionally, its disposer.
///
/// A component with a disposer is owned by the scope that activated it and
/// is released when that scope is disposed.
#[derive(Clone)]
pub struct Component {
    instance: Instance,
    disposer: Option<Arc<dyn Dispose>>,
}

impl Component {
    /// A stage with nothing to release.
    #[must_use]
    pub fn stage(stage: Arc<dyn Middleware>) -> Self {
        Self {
            instance: Instance::Stage(stage),
            disposer: None,
        }
    }

    /// A stage that is released with its scope.
    pub fn disposable_stage<M: Middleware + Dispose + 'static>(stage: Arc<M>) -> Self {
        Self {
            instance: Instance::Stage(stage.clone()),
            disposer: Some(stage),
        }
    }

    /// A service with nothing to release.
    pub fn service<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            instance: Instance::Service(value),
            disposer: None,
        }
    }

    /// A service that is released with its scope.
    pub fn disposable_service<T: Dispose + 'static>(value: Arc<T>) -> Self {
        Self {
            instance: Instance::Service(value.clone()),
            disposer: Some(value),
        }
    }

    /// Returns the instance.
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn into_parts(self) -> (Instance, Option<Arc<dyn Dispose>>) {
        (self.instance, self.disposer)
    }
}

/// A factory invoked with the scope it is being resolved in.
pub type Factory = Arc<dyn Fn(&Scope<'_>) -> Result<Component, ScopeError> + Send + Sync>;

/// How often a factory binding is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Every resolve activates a new instance owned by the resolving scope.
    Transient,
    /// One instance per enclosing scope with this tag, owned by that scope.
    PerScope(ScopeTag),
}

/// A registered mapping from a key to an instance or a factory.
#[derive(Clone)]
pub enum Binding {
    /// A fixed, already constructed instance. Never owned by the scope.
    Instance(Instance),
    /// A factory activated on resolve.
    Factory {
        /// The activation function.
        factory: Factory,
        /// How often it is activated.
        lifetime: Lifetime,
    },
}

impl Binding {
    /// A fixed stage instance.
    #[must_use]
    pub fn stage(stage: Arc<dyn Middleware>) -> Self {
        Self::Instance(Instance::Stage(stage))
    }

    /// A fixed service instance.
    pub fn service<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::Instance(Instance::service(value))
    }

    /// A transient factory.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Component, ScopeError> + Send + Sync + 'static,
    {
        Self::Factory {
            factory: Arc::new(factory),
            lifetime: Lifetime::Transient,
        }
    }

    /// A factory activated once per Request Scope.
    pub fn per_request<F>(factory: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Component, ScopeError> + Send + Sync + 'static,
    {
        Self::Factory {
            factory: Arc::new(factory),
            lifetime: Lifetime::PerScope(ScopeTag::Request),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Self::Factory { lifetime, .. } => f
                .debug_struct("Factory")
                .field("lifetime", lifetime)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Settings {
        greeting: &'static str,
    }

    #[test]
    fn test_key_display() {
        assert_eq!(BindingKey::Stage(StageKind::new("auth")).to_string(), "stage:auth");
        assert_eq!(BindingKey::Next.to_string(), "next");
        assert_eq!(BindingKey::Carrier.to_string(), "carrier");
        assert_eq!(BindingKey::Service("db").to_string(), "service:db");
    }

    #[test]
    fn test_instance_downcast() {
        let instance = Instance::service(Arc::new(Settings { greeting: "hi" }));
        let settings = instance.downcast::<Settings>().unwrap();
        assert_eq!(settings.greeting, "hi");
        assert!(instance.downcast::<String>().is_none());
        assert!(instance.as_stage().is_none());
    }

    #[test]
    fn test_binding_lifetimes() {
        let transient = Binding::factory(|_| Ok(Component::service(Arc::new(1_u32))));
        let shared = Binding::per_request(|_| Ok(Component::service(Arc::new(2_u32))));

        assert!(matches!(transient, Binding::Factory { lifetime: Lifetime::Transient, .. }));
        assert!(matches!(
            shared,
            Binding::Factory { lifetime: Lifetime::PerScope(ScopeTag::Request), .. }
        ));
    }
}

//! The resolution scope tree.

use super::binding::{Binding, BindingKey, Component, Dispose, Instance, Lifetime};
use super::ScopeTag;
use crate::context::RequestContext;
use crate::errors::{
    DuplicateBindingError, LifecycleViolation, ScopeError, ScopeLifecycleError,
    UnresolvedBindingError,
};
use crate::events::{EventSink, LifecycleEvent};
use crate::stages::{Middleware, StageKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// An instance whose release is the scope's responsibility.
struct Owned {
    key: BindingKey,
    disposer: Arc<dyn Dispose>,
}

/// A node in the tree of nested resolution contexts.
///
/// A scope holds its own bindings and a borrowed reference to its parent
/// for fallback lookups. Children borrow their parent, so a parent always
/// outlives its children. Instances activated here that carry a disposer
/// are owned here and released in reverse activation order by
/// [`dispose`](Self::dispose).
///
/// A scope dropped without `dispose` still releases what it owns, but the
/// parent records the leak and its own `dispose` fails with
/// [`LifecycleViolation::LeakedChildren`].
pub struct Scope<'p> {
    id: Uuid,
    tag: ScopeTag,
    depth: usize,
    request_id: Option<Uuid>,
    parent: Option<&'p Scope<'p>>,
    bindings: HashMap<BindingKey, Binding>,
    owned: Mutex<Vec<Owned>>,
    /// Instances cached for `Lifetime::PerScope` bindings whose tag matches
    /// this scope, keyed by the declaring scope so shadowing bindings never
    /// share an instance.
    shared: Mutex<HashMap<(Uuid, BindingKey), Instance>>,
    /// Serializes attaching children against disposal.
    lifecycle: Mutex<()>,
    open_children: AtomicUsize,
    leaked_children: AtomicUsize,
    /// Whether this scope counts toward its parent's open children.
    attached: bool,
    disposed: AtomicBool,
    sink: Arc<dyn EventSink>,
}

impl Scope<'static> {
    /// Creates a parentless root scope.
    pub(crate) fn root(sink: Arc<dyn EventSink>) -> Self {
        Self::detached(ScopeTag::Root, None, None, 0, sink)
    }

    pub(crate) fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = sink;
    }
}

impl<'p> Scope<'p> {
    fn detached(
        tag: ScopeTag,
        parent: Option<&'p Scope<'p>>,
        request_id: Option<Uuid>,
        depth: usize,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            tag,
            depth,
            request_id,
            parent,
            bindings: HashMap::new(),
            owned: Mutex::new(Vec::new()),
            shared: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(()),
            open_children: AtomicUsize::new(0),
            leaked_children: AtomicUsize::new(0),
            attached: false,
            disposed: AtomicBool::new(false),
            sink,
        }
    }

    /// Returns the scope id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the scope tag.
    #[must_use]
    pub fn tag(&self) -> ScopeTag {
        self.tag
    }

    /// Returns the nesting depth (root = 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the request this scope belongs to, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// Returns the parent scope.
    #[must_use]
    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    /// Returns the number of children currently open.
    #[must_use]
    pub fn open_children(&self) -> usize {
        self.open_children.load(Ordering::SeqCst)
    }

    /// Returns the number of instances this scope currently owns.
    #[must_use]
    pub fn owned_count(&self) -> usize {
        self.owned.lock().len()
    }

    /// Returns true once the scope has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Returns true if the key is bound in this scope itself.
    #[must_use]
    pub fn has_local(&self, key: &BindingKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Iterates this scope and its ancestors, innermost first.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Adds a binding visible to this scope and its descendants.
    ///
    /// Bindings of ancestors with the same key are shadowed, never merged.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateBindingError`] if the key is already bound here.
    pub fn register(&mut self, key: BindingKey, binding: Binding) -> Result<&mut Self, ScopeError> {
        self.ensure_live()?;
        if self.bindings.contains_key(&key) {
            return Err(DuplicateBindingError::new(key.to_string(), self.tag.to_string()).into());
        }
        self.bindings.insert(key, binding);
        Ok(self)
    }

    /// Opens a child scope and lets `configure` register child-local bindings.
    ///
    /// No factory of any ancestor runs during creation. If `configure` fails
    /// the child is discarded and never counts as open.
    ///
    /// # Errors
    ///
    /// Returns the error from `configure`, or a lifecycle error if this
    /// scope is already disposed.
    pub fn open_child<F>(&self, tag: ScopeTag, configure: F) -> Result<Scope<'_>, ScopeError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ScopeError>,
    {
        self.open_child_for(tag, self.request_id, configure)
    }

    pub(crate) fn open_child_for<'s, F>(
        &'s self,
        tag: ScopeTag,
        request_id: Option<Uuid>,
        configure: F,
    ) -> Result<Scope<'s>, ScopeError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), ScopeError>,
    {
        self.ensure_live()?;

        let mut child = Scope::detached(tag, Some(self), request_id, self.depth + 1, self.sink.clone());
        if let Err(err) = configure(&mut child) {
            child.discard();
            return Err(err);
        }

        let attached = {
            let _guard = self.lifecycle.lock();
            let live = !self.is_disposed();
            if live {
                self.open_children.fetch_add(1, Ordering::SeqCst);
            }
            live
        };
        if !attached {
            child.discard();
            return Err(self.violation(LifecycleViolation::Disposed).into());
        }
        child.attached = true;

        debug!(scope = %child.tag, scope_id = %child.id, depth = child.depth, "Scope opened");
        self.sink.emit(&LifecycleEvent::ScopeOpened {
            scope_id: child.id,
            parent_id: Some(self.id),
            request_id: child.request_id,
            tag: child.tag.to_string(),
            depth: child.depth,
        });

        Ok(child)
    }

    /// Resolves a key, walking up through the ancestors.
    ///
    /// Factories run with this scope as their resolution context, so the
    /// constructed instance's own dependencies follow the same shadowing
    /// rules. Per-scope factories run in the nearest ancestor whose tag
    /// matches and are cached there.
    ///
    /// # Errors
    ///
    /// Returns [`UnresolvedBindingError`] if no ancestor binds the key, or
    /// whatever the factory returns.
    pub fn resolve(&self, key: &BindingKey) -> Result<Instance, ScopeError> {
        self.ensure_live()?;

        for scope in self.ancestors() {
            if let Some(binding) = scope.bindings.get(key) {
                return self.activate(scope.id, *key, binding);
            }
        }

        let searched: Vec<String> = self.ancestors().map(|s| s.tag.to_string()).collect();
        debug!(key = %key, searched = ?searched, "Binding not found");
        Err(UnresolvedBindingError::new(key.to_string(), searched).into())
    }

    /// Resolves the stage bound to `kind`.
    ///
    /// # Errors
    ///
    /// Fails if the kind is unbound or bound to something that is not a stage.
    pub fn resolve_stage(&self, kind: StageKind) -> Result<Arc<dyn Middleware>, ScopeError> {
        self.resolve_stage_key(BindingKey::Stage(kind))
    }

    /// Resolves the successor handle registered for the stage being built.
    ///
    /// # Errors
    ///
    /// Fails outside a Stage Scope.
    pub fn next_stage(&self) -> Result<Arc<dyn Middleware>, ScopeError> {
        self.resolve_stage_key(BindingKey::Next)
    }

    /// Resolves a named service and downcasts it.
    ///
    /// # Errors
    ///
    /// Fails if the name is unbound or bound to a different type.
    pub fn resolve_service<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> Result<Arc<T>, ScopeError> {
        let key = BindingKey::Service(name);
        self.resolve(&key)?
            .downcast::<T>()
            .ok_or_else(|| ScopeError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolves the inbound request carrier.
    ///
    /// # Errors
    ///
    /// Fails outside a Request Scope.
    pub fn carrier(&self) -> Result<Arc<RequestContext>, ScopeError> {
        self.resolve(&BindingKey::Carrier)?
            .downcast::<RequestContext>()
            .ok_or_else(|| ScopeError::TypeMismatch {
                key: BindingKey::Carrier.to_string(),
                expected: std::any::type_name::<RequestContext>(),
            })
    }

    /// Disposes the instances this scope owns, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeLifecycleError`] if a child is still open, if the scope
    /// was already disposed, or if a child was dropped without disposal. In
    /// the last case the owned instances are still released.
    pub fn dispose(&self) -> Result<(), ScopeError> {
        {
            let _guard = self.lifecycle.lock();
            if self.is_disposed() {
                return Err(self.violation(LifecycleViolation::AlreadyDisposed).into());
            }
            let open = self.open_children();
            if open > 0 {
                warn!(scope = %self.tag, scope_id = %self.id, open, "Dispose refused: children still open");
                return Err(self.violation(LifecycleViolation::OpenChildren(open)).into());
            }
            self.disposed.store(true, Ordering::SeqCst);
        }

        let released = self.release_owned();
        if self.attached {
            if let Some(parent) = self.parent {
                parent.open_children.fetch_sub(1, Ordering::SeqCst);
            }
        }

        debug!(scope = %self.tag, scope_id = %self.id, released, "Scope disposed");
        self.sink.emit(&LifecycleEvent::ScopeDisposed {
            scope_id: self.id,
            request_id: self.request_id,
            tag: self.tag.to_string(),
            depth: self.depth,
            released,
        });

        let leaked = self.leaked_children.load(Ordering::SeqCst);
        if leaked > 0 {
            error!(scope = %self.tag, scope_id = %self.id, leaked, "Child scopes leaked");
            return Err(self.violation(LifecycleViolation::LeakedChildren(leaked)).into());
        }
        Ok(())
    }

    /// Disposes the scope and gives up the borrow it holds on its parent.
    ///
    /// # Errors
    ///
    /// As [`dispose`](Self::dispose).
    pub fn close(self) -> Result<(), ScopeError> {
        self.dispose()
    }

    fn resolve_stage_key(&self, key: BindingKey) -> Result<Arc<dyn Middleware>, ScopeError> {
        match self.resolve(&key)? {
            Instance::Stage(stage) => Ok(stage),
            Instance::Service(_) => Err(ScopeError::TypeMismatch {
                key: key.to_string(),
                expected: "stage",
            }),
        }
    }

    fn activate(&self, declared_in: Uuid, key: BindingKey, binding: &Binding) -> Result<Instance, ScopeError> {
        match binding {
            Binding::Instance(instance) => Ok(instance.clone()),
            Binding::Factory {
                factory,
                lifetime: Lifetime::Transient,
            } => {
                let component = factory(self)?;
                Ok(self.adopt(key, component))
            }
            Binding::Factory {
                factory,
                lifetime: Lifetime::PerScope(tag),
            } => {
                let owner = self.ancestors().find(|s| s.tag == *tag).ok_or_else(|| {
                    self.violation(LifecycleViolation::NoMatchingScope(tag.to_string()))
                })?;

                let slot = (declared_in, key);
                if let Some(existing) = owner.shared.lock().get(&slot) {
                    return Ok(existing.clone());
                }

                // The lock is not held while the factory runs; it may resolve
                // other per-scope bindings through the same owner.
                let component = factory(owner)?;
                let instance = owner.adopt(key, component);
                Ok(owner.shared.lock().entry(slot).or_insert(instance).clone())
            }
        }
    }

    fn adopt(&self, key: BindingKey, component: Component) -> Instance {
        let (instance, disposer) = component.into_parts();
        if let Some(disposer) = disposer {
            self.owned.lock().push(Owned { key, disposer });
        }
        instance
    }

    fn release_owned(&self) -> usize {
        let owned = std::mem::take(&mut *self.owned.lock());
        let count = owned.len();
        for entry in owned.into_iter().rev() {
            let disposer = entry.disposer;
            if let Err(panic) =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| disposer.dispose()))
            {
                warn!(key = %entry.key, "Disposer panicked: {:?}", panic);
            }
        }
        self.shared.lock().clear();
        count
    }

    /// Tears down a child whose configuration failed before it was attached.
    fn discard(&mut self) {
        *self.disposed.get_mut() = true;
        self.release_owned();
    }

    fn ensure_live(&self) -> Result<(), ScopeLifecycleError> {
        if self.is_disposed() {
            return Err(self.violation(LifecycleViolation::Disposed));
        }
        Ok(())
    }

    fn violation(&self, violation: LifecycleViolation) -> ScopeLifecycleError {
        ScopeLifecycleError::new(self.tag.to_string(), violation)
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if *self.disposed.get_mut() {
            return;
        }
        *self.disposed.get_mut() = true;
        self.release_owned();

        if !self.attached {
            return;
        }
        warn!(scope = %self.tag, scope_id = %self.id, "Scope dropped without dispose");
        if let Some(parent) = self.parent {
            parent.open_children.fetch_sub(1, Ordering::SeqCst);
            parent.leaked_children.fetch_add(1, Ordering::SeqCst);
        }
        self.sink.emit(&LifecycleEvent::ScopeLeaked {
            scope_id: self.id,
            request_id: self.request_id,
            tag: self.tag.to_string(),
            depth: self.depth,
        });
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("depth", &self.depth)
            .field("bindings", &self.bindings.len())
            .field("owned", &self.owned_count())
            .field("open_children", &self.open_children())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Iterator over a scope and its ancestors, innermost first.
pub struct Ancestors<'a> {
    next: Option<&'a Scope<'a>>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Scope<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

//! Tests for the resolution scope tree.

#[cfg(test)]
mod tests {
    use crate::context::RequestContext;
    use crate::errors::{LifecycleViolation, ScopeError};
    use crate::events::CollectingEventSink;
    use crate::scope::{Binding, BindingKey, Component, ContainerBuilder, RootContainer, ScopeTag};
    use crate::stages::StageKind;
    use crate::testing::{register_per_request_probe, DisposeProbe, Journal, ProbeAction};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const A: StageKind = StageKind::new("a");
    const B: StageKind = StageKind::new("b");

    fn request() -> Arc<RequestContext> {
        Arc::new(RequestContext::new("GET", "/scope"))
    }

    fn register_probe(builder: &mut ContainerBuilder, name: &'static str, journal: &Journal) {
        let journal = journal.clone();
        builder
            .register(
                BindingKey::Service(name),
                Binding::factory(move |_| {
                    Ok(Component::disposable_service(Arc::new(DisposeProbe::new(
                        name,
                        journal.clone(),
                    ))))
                }),
            )
            .unwrap();
    }

    #[test]
    fn test_duplicate_registration_in_same_scope() {
        let mut builder = RootContainer::builder();
        builder.register_service("db", Arc::new(1_u32)).unwrap();
        let err = builder.register_service("db", Arc::new(2_u32)).unwrap_err();
        assert!(matches!(err, ScopeError::Duplicate(_)));
        assert!(err.to_string().contains("'service:db'"));
    }

    #[test]
    fn test_duplicate_in_child_is_not_opened() {
        let container = RootContainer::builder().build();
        let root = container.scope();
        let err = root
            .open_child(ScopeTag::Named("batch"), |scope| {
                scope.register(BindingKey::Service("x"), Binding::service(Arc::new(1_u32)))?;
                scope.register(BindingKey::Service("x"), Binding::service(Arc::new(2_u32)))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ScopeError::Duplicate(_)));
        assert_eq!(root.open_children(), 0);
        container.dispose().unwrap();
    }

    #[test]
    fn test_same_key_in_child_shadows_parent() {
        let mut builder = RootContainer::builder();
        builder.register_service("db", Arc::new("root-db".to_string())).unwrap();
        let container = builder.build();

        let child = container
            .scope()
            .open_child(ScopeTag::Named("batch"), |scope| {
                scope.register(
                    BindingKey::Service("db"),
                    Binding::service(Arc::new("child-db".to_string())),
                )?;
                Ok(())
            })
            .unwrap();

        assert_eq!(*child.resolve_service::<String>("db").unwrap(), "child-db");
        assert_eq!(*container.scope().resolve_service::<String>("db").unwrap(), "root-db");
        child.dispose().unwrap();
        container.dispose().unwrap();
    }

    #[test]
    fn test_lookup_walks_every_ancestor_to_root() {
        let mut builder = RootContainer::builder();
        builder.register_service("config", Arc::new(7_u32)).unwrap();
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let first = request.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
        let leaf = first.open_child(ScopeTag::Stage(B), |_| Ok(())).unwrap();

        assert_eq!(*leaf.resolve_service::<u32>("config").unwrap(), 7);

        let err = leaf.resolve(&BindingKey::Service("missing")).unwrap_err();
        match err {
            ScopeError::Unresolved(err) => {
                assert_eq!(err.key, "service:missing");
                assert_eq!(err.searched, vec!["stage:b", "stage:a", "request", "root"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let depths: Vec<usize> = leaf.ancestors().map(|s| s.depth()).collect();
        assert_eq!(depths, vec![3, 2, 1, 0]);

        leaf.close().unwrap();
        first.close().unwrap();
        request.finish().unwrap();
        container.dispose().unwrap();
    }

    #[test]
    fn test_dispose_with_open_child_keeps_owned_instances() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        register_probe(&mut builder, "conn", &journal);
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        request.resolve(&BindingKey::Service("conn")).unwrap();
        assert_eq!(request.owned_count(), 1);

        let child = request.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
        let err = request.dispose().unwrap_err();
        assert_eq!(err.violation(), Some(&LifecycleViolation::OpenChildren(1)));
        assert_eq!(request.owned_count(), 1);
        assert!(!request.is_disposed());
        assert_eq!(journal.count(ProbeAction::Disposed), 0);

        child.close().unwrap();
        request.finish().unwrap();
        assert_eq!(journal.trace(), vec!["created:conn", "disposed:conn"]);
    }

    #[test]
    fn test_double_dispose_is_rejected() {
        let container = RootContainer::builder().build();
        let scope = container.scope().open_child(ScopeTag::Named("batch"), |_| Ok(())).unwrap();
        scope.dispose().unwrap();
        let err = scope.dispose().unwrap_err();
        assert_eq!(err.violation(), Some(&LifecycleViolation::AlreadyDisposed));
        container.dispose().unwrap();
    }

    #[test]
    fn test_disposed_scope_cannot_be_used() {
        let container = RootContainer::builder().build();
        let scope = container.scope().open_child(ScopeTag::Named("batch"), |_| Ok(())).unwrap();
        scope.dispose().unwrap();

        let err = scope.resolve(&BindingKey::Next).unwrap_err();
        assert_eq!(err.violation(), Some(&LifecycleViolation::Disposed));
        let err = scope.open_child(ScopeTag::Named("late"), |_| Ok(())).unwrap_err();
        assert_eq!(err.violation(), Some(&LifecycleViolation::Disposed));
        container.dispose().unwrap();
    }

    #[test]
    fn test_owned_instances_released_newest_first() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        for name in ["a", "b", "c"] {
            register_probe(&mut builder, name, &journal);
        }
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        for name in ["a", "b", "c"] {
            request.resolve(&BindingKey::Service(name)).unwrap();
        }
        request.finish().unwrap();

        assert_eq!(journal.labels_of(ProbeAction::Disposed), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_transient_factories_build_new_instances() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        register_probe(&mut builder, "conn", &journal);
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let first = request.resolve_service::<DisposeProbe>("conn").unwrap();
        let second = request.resolve_service::<DisposeProbe>("conn").unwrap();
        assert_ne!(first.instance(), second.instance());
        assert_eq!(request.owned_count(), 2);
        request.finish().unwrap();
    }

    #[test]
    fn test_fixed_instances_are_not_owned() {
        let mut builder = RootContainer::builder();
        builder.register_service("limit", Arc::new(10_u32)).unwrap();
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        request.resolve(&BindingKey::Service("limit")).unwrap();
        assert_eq!(request.owned_count(), 0);
        assert_eq!(container.scope().owned_count(), 0);
        request.finish().unwrap();
    }

    #[test]
    fn test_factory_sees_resolving_scope() {
        let mut builder = RootContainer::builder();
        builder
            .register(
                BindingKey::Service("path"),
                Binding::factory(|scope| {
                    let carrier = scope.carrier()?;
                    Ok(Component::service(Arc::new(carrier.path().to_string())))
                }),
            )
            .unwrap();
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let stage = request.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
        assert_eq!(*stage.resolve_service::<String>("path").unwrap(), "/scope");
        stage.close().unwrap();
        request.finish().unwrap();

        let err = container.scope().resolve(&BindingKey::Service("path")).unwrap_err();
        assert!(matches!(err, ScopeError::Unresolved(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let mut builder = RootContainer::builder();
        builder.register_service("name", Arc::new("x".to_string())).unwrap();
        let container = builder.build();

        let err = container.scope().resolve_service::<u32>("name").unwrap_err();
        assert!(matches!(err, ScopeError::TypeMismatch { .. }));
        let err = container.scope().resolve_stage(A).unwrap_err();
        assert!(matches!(err, ScopeError::Unresolved(_)));
    }

    #[test]
    fn test_per_request_component_is_shared_and_owned_by_request() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        register_per_request_probe(&mut builder, "session", &journal).unwrap();
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let first = request.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
        let second = first.open_child(ScopeTag::Stage(B), |_| Ok(())).unwrap();

        let outer = first.resolve_service::<DisposeProbe>("session").unwrap();
        let inner = second.resolve_service::<DisposeProbe>("session").unwrap();
        assert!(Arc::ptr_eq(&outer, &inner));
        assert_eq!(first.owned_count(), 0);
        assert_eq!(second.owned_count(), 0);
        assert_eq!(request.owned_count(), 1);

        second.close().unwrap();
        first.close().unwrap();
        assert_eq!(journal.count(ProbeAction::Disposed), 0);
        request.finish().unwrap();
        assert_eq!(journal.count(ProbeAction::Disposed), 1);

        let next = container.begin_request(self::request()).unwrap();
        let fresh = next.resolve_service::<DisposeProbe>("session").unwrap();
        assert_ne!(fresh.instance(), outer.instance());
        next.finish().unwrap();
        assert_eq!(journal.instances_of("session").len(), 2);
    }

    #[test]
    fn test_per_request_binding_in_child_shadows_root() {
        let mut builder = RootContainer::builder();
        builder
            .register_per_request("session", |_| Ok(Arc::new("root-binding".to_string())))
            .unwrap();
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let outer = request.resolve_service::<String>("session").unwrap();

        let child = request
            .open_child(ScopeTag::Stage(A), |scope| {
                scope.register(
                    BindingKey::Service("session"),
                    Binding::per_request(|_| {
                        Ok(Component::service(Arc::new("child-binding".to_string())))
                    }),
                )?;
                Ok(())
            })
            .unwrap();
        let inner = child.resolve_service::<String>("session").unwrap();
        assert_eq!(*outer, "root-binding");
        assert_eq!(*inner, "child-binding");
        assert!(Arc::ptr_eq(
            &inner,
            &child.resolve_service::<String>("session").unwrap()
        ));
        child.close().unwrap();

        let plain = request.open_child(ScopeTag::Stage(B), |_| Ok(())).unwrap();
        assert!(Arc::ptr_eq(
            &outer,
            &plain.resolve_service::<String>("session").unwrap()
        ));
        plain.close().unwrap();

        let rebound = request
            .open_child(ScopeTag::Stage(B), |scope| {
                scope.register(
                    BindingKey::Service("session"),
                    Binding::per_request(|_| {
                        Ok(Component::service(Arc::new("sibling-binding".to_string())))
                    }),
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(
            *rebound.resolve_service::<String>("session").unwrap(),
            "sibling-binding"
        );
        rebound.close().unwrap();
        request.finish().unwrap();
    }

    #[test]
    fn test_root_dispose_never_races_request_attach() {
        let container = RootContainer::builder().build();

        std::thread::scope(|threads| {
            for _ in 0..4 {
                threads.spawn(|| {
                    for _ in 0..200 {
                        match container.begin_request(request()) {
                            Ok(scope) => {
                                assert!(!container.scope().is_disposed());
                                scope.finish().unwrap();
                            }
                            Err(err) => {
                                assert_eq!(err.violation(), Some(&LifecycleViolation::Disposed));
                            }
                        }
                    }
                });
            }
            while container.dispose().is_err() {
                std::thread::yield_now();
            }
        });

        assert!(container.scope().is_disposed());
        assert_eq!(container.scope().open_children(), 0);
    }

    #[test]
    fn test_builder_debug_lists_stage_kinds() {
        let mut builder = RootContainer::builder();
        builder
            .register_stage(A, |_| Err(ScopeError::TypeMismatch { key: "a".into(), expected: "stage" }))
            .unwrap();
        let text = format!("{builder:?}");
        assert!(text.starts_with("ContainerBuilder"));
        assert!(text.contains("\"a\""));
    }

    #[test]
    fn test_per_request_outside_request_fails() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        register_per_request_probe(&mut builder, "session", &journal).unwrap();
        let container = builder.build();

        let err = container.scope().resolve(&BindingKey::Service("session")).unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&LifecycleViolation::NoMatchingScope("request".into()))
        );
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_dropped_child_surfaces_as_leak() {
        let sink = Arc::new(CollectingEventSink::new());
        let journal = Journal::new();
        let mut builder = RootContainer::builder().with_event_sink(sink.clone());
        register_probe(&mut builder, "conn", &journal);
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        {
            let child = request.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
            child.resolve(&BindingKey::Service("conn")).unwrap();
            assert_eq!(request.open_children(), 1);
        }
        assert_eq!(request.open_children(), 0);
        assert_eq!(journal.count(ProbeAction::Disposed), 1);
        assert_eq!(sink.count_of("scope.leaked"), 1);

        let err = request.finish().unwrap_err();
        assert_eq!(err.violation(), Some(&LifecycleViolation::LeakedChildren(1)));
        assert_eq!(sink.count_of("scope.disposed"), 1);
    }

    #[test]
    fn test_failed_configure_releases_and_is_not_counted() {
        let journal = Journal::new();
        let mut builder = RootContainer::builder();
        register_probe(&mut builder, "conn", &journal);
        let container = builder.build();

        let request = container.begin_request(request()).unwrap();
        let err = request
            .open_child(ScopeTag::Stage(A), |scope| {
                scope.resolve(&BindingKey::Service("conn"))?;
                scope.resolve(&BindingKey::Service("missing"))?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, ScopeError::Unresolved(_)));
        assert_eq!(request.open_children(), 0);
        assert_eq!(journal.trace(), vec!["created:conn", "disposed:conn"]);
        request.finish().unwrap();
    }

    #[test]
    fn test_events_report_open_and_dispose() {
        let sink = Arc::new(CollectingEventSink::new());
        let container = RootContainer::builder().with_event_sink(sink.clone()).build();

        let req = request();
        let request_id = req.request_id();
        let scope = container.begin_request(req).unwrap();
        let stage = scope.open_child(ScopeTag::Stage(A), |_| Ok(())).unwrap();
        assert_eq!(stage.request_id(), Some(request_id));
        stage.close().unwrap();
        scope.finish().unwrap();

        assert_eq!(sink.opened_tags(), vec!["request", "stage:a"]);
        assert_eq!(sink.disposed_tags(), vec!["stage:a", "request"]);
        let (opened, disposed) = sink.scope_ids_for(request_id);
        assert_eq!(opened.len(), disposed.len());
    }
}

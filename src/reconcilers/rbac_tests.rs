// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `rbac.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{Filter, FilterSpec};
    use crate::reconcilers::ownership::{owner_ref, service_account_owners};
    use crate::reconcilers::testing::{broker_sink, widget, Harness, Verb, NAMESPACE};

    fn filter(name: &str) -> Filter {
        let mut obj = Filter::new(
            name,
            FilterSpec {
                expression: "true".to_string(),
                sink: Some(broker_sink()),
                adapter_overrides: None,
            },
        );
        obj.metadata.namespace = Some(NAMESPACE.to_string());
        obj.metadata.uid = Some(crate::reconcilers::testing::new_uid());
        obj
    }

    #[tokio::test]
    async fn test_no_owners_skips_rbac() {
        let h = Harness::new();
        let sa = reconcile_rbac(&h.ctx, &widget("w1"), Vec::new()).await.unwrap();
        assert!(sa.is_none());
        assert_eq!(h.child_writes(), 0);
    }

    #[tokio::test]
    async fn test_creates_service_account_and_config_watcher_binding() {
        let h = Harness::new();
        let obj = widget("w1");

        let sa = reconcile_rbac(&h.ctx, &obj, service_account_owners(&obj, &[]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sa.name_any(), "widget-adapter");
        assert!(sa.metadata.uid.is_some());

        let rb = h
            .role_bindings
            .object(NAMESPACE, "widget-adapter-config-watcher")
            .expect("config watcher binding");
        assert_eq!(rb.role_ref.name, CONFIG_WATCHER_CLUSTER_ROLE);
        assert_eq!(rb.role_ref.kind, "ClusterRole");
        let subject = &rb.subjects.as_ref().unwrap()[0];
        assert_eq!(subject.kind, "ServiceAccount");
        assert_eq!(subject.name, "widget-adapter");
        assert_eq!(subject.namespace.as_deref(), Some(NAMESPACE));

        let owner = &rb.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(Some(owner.uid.clone()), sa.metadata.uid);
        assert_eq!(owner.controller, Some(true));

        // Single-tenant kinds get no shared binding.
        assert_eq!(h.role_bindings.objects().len(), 1);

        let events = h.events.events();
        assert_eq!(h.events.reasons(), vec!["CreateRBAC", "CreateRBAC"]);
        assert_eq!(events[0].0.kind.as_deref(), Some("Namespace"));
        assert_eq!(events[0].0.name.as_deref(), Some(NAMESPACE));
    }

    #[tokio::test]
    async fn test_multi_tenant_kind_gets_shared_binding() {
        let h = Harness::new();
        let obj = filter("f1");

        reconcile_rbac(&h.ctx, &obj, service_account_owners(&obj, &[]))
            .await
            .unwrap();

        let rb = h
            .role_bindings
            .object(NAMESPACE, "filter-adapter")
            .expect("shared binding");
        assert_eq!(rb.role_ref.name, "filter-adapter");
        assert!(h
            .role_bindings
            .object(NAMESPACE, "filter-adapter-config-watcher")
            .is_some());
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let h = Harness::new();
        let obj = widget("w1");
        let owners = service_account_owners(&obj, &[]);

        reconcile_rbac(&h.ctx, &obj, owners.clone()).await.unwrap();
        let writes = h.child_writes();
        h.events.clear();

        reconcile_rbac(&h.ctx, &obj, owners).await.unwrap();

        assert_eq!(h.child_writes(), writes);
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_new_owner_updates_service_account_and_keeps_tokens() {
        let h = Harness::new();
        let w1 = widget("w1");
        let w2 = widget("w2");

        reconcile_rbac(&h.ctx, &w1, service_account_owners(&w1, &[]))
            .await
            .unwrap();
        h.service_accounts.modify(NAMESPACE, "widget-adapter", |sa| {
            sa.secrets = Some(vec![
                ObjectReference {
                    name: Some("widget-adapter-token-abcde".to_string()),
                    ..Default::default()
                },
                ObjectReference {
                    name: Some("unrelated".to_string()),
                    ..Default::default()
                },
            ]);
        });
        h.events.clear();

        let sa = reconcile_rbac(&h.ctx, &w2, service_account_owners(&w2, &[w1.clone()]))
            .await
            .unwrap()
            .unwrap();

        let owners = sa.metadata.owner_references.clone().unwrap();
        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&owner_ref(&w1).unwrap()));
        assert!(owners.contains(&owner_ref(&w2).unwrap()));

        let secrets: Vec<_> = sa
            .secrets
            .unwrap()
            .into_iter()
            .filter_map(|s| s.name)
            .collect();
        assert_eq!(secrets, vec!["widget-adapter-token-abcde"]);

        assert_eq!(h.service_accounts.replaces(), 1);
        assert_eq!(h.events.reasons(), vec!["UpdateRBAC"]);
    }

    #[tokio::test]
    async fn test_concurrently_created_service_account_is_synced() {
        let w1 = widget("w1");
        let w2 = widget("w2");
        let elsewhere = Harness::new();
        let theirs = reconcile_rbac(&elsewhere.ctx, &w1, service_account_owners(&w1, &[]))
            .await
            .unwrap()
            .unwrap();

        let h = Harness::new();
        h.service_accounts.race_next_create(theirs.clone());

        let sa = reconcile_rbac(&h.ctx, &w2, service_account_owners(&w2, &[w1.clone()]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sa.metadata.uid, theirs.metadata.uid);
        let owners = sa.metadata.owner_references.clone().unwrap();
        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&owner_ref(&w2).unwrap()));
        assert_eq!(h.service_accounts.creates(), 0);
        assert_eq!(h.service_accounts.replaces(), 1);
        assert_eq!(h.events.reasons(), vec!["UpdateRBAC", "CreateRBAC"]);
    }

    #[tokio::test]
    async fn test_private_identity_gets_private_service_account() {
        let h = Harness::new();
        let mut obj = widget("w1");
        obj.spec.own_identity = true;

        let sa = reconcile_rbac(&h.ctx, &obj, service_account_owners(&obj, &[]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sa.name_any(), "widget-i-w1");
        assert!(h
            .role_bindings
            .object(NAMESPACE, "widget-i-w1-config-watcher")
            .is_some());
    }

    #[tokio::test]
    async fn test_get_failure_is_transient() {
        let h = Harness::new();
        h.service_accounts.fail(Verb::Get, 500);
        let obj = widget("w1");

        let err = reconcile_rbac(&h.ctx, &obj, service_account_owners(&obj, &[]))
            .await
            .unwrap_err();

        assert!(!err.is_permanent());
        assert_eq!(err.reason(), REASON_FAILED_RBAC_GET);
    }

    #[tokio::test]
    async fn test_create_failure_is_transient() {
        let h = Harness::new();
        h.role_bindings.fail(Verb::Create, 403);
        let obj = widget("w1");

        let err = reconcile_rbac(&h.ctx, &obj, service_account_owners(&obj, &[]))
            .await
            .unwrap_err();

        assert!(!err.is_permanent());
        assert_eq!(err.reason(), REASON_FAILED_RBAC_CREATE);
        assert!(err.event().message.contains("RoleBinding"));
    }

    #[test]
    fn test_role_binding_equal_detects_subject_change() {
        let mut sa = new_service_account(NAMESPACE, "widget-adapter", "Widget", Vec::new());
        sa.metadata.uid = Some("sa-uid".to_string());

        let a = new_role_binding(NAMESPACE, "rb", "role", "Widget", &sa).unwrap();
        let mut b = a.clone();
        assert!(role_binding_equal(&a, &b));

        b.subjects.as_mut().unwrap()[0].name = "other".to_string();
        assert!(!role_binding_equal(&a, &b));
    }

    #[test]
    fn test_role_binding_requires_persisted_service_account() {
        let sa = new_service_account(NAMESPACE, "widget-adapter", "Widget", Vec::new());
        assert!(new_role_binding(NAMESPACE, "rb", "role", "Widget", &sa).is_err());
    }
}

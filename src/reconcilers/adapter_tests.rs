// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `adapter.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{AdapterOverrides, Filter, FilterSpec};
    use crate::labels::SWITCHYARD_TENANT_LABEL;
    use crate::reconcilers::testing::{broker_sink, widget, Widget, NAMESPACE, WIDGET_IMAGE};

    fn sink() -> Url {
        Url::parse("http://broker.default.svc.cluster.local/").unwrap()
    }

    fn filter(name: &str) -> Filter {
        let mut obj = Filter::new(
            name,
            FilterSpec {
                expression: "$type == 'a'".to_string(),
                sink: Some(broker_sink()),
                adapter_overrides: None,
            },
        );
        obj.metadata.namespace = Some(NAMESPACE.to_string());
        obj.metadata.uid = Some(format!("uid-{name}"));
        obj
    }

    fn env_value<'a>(env: &'a [EnvVar], name: &str) -> Option<&'a str> {
        env.iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    fn deployment_env(deployment: &Deployment) -> &[EnvVar] {
        deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .as_deref()
            .unwrap()
    }

    #[test]
    fn test_component_name_is_lowercase_kind() {
        assert_eq!(component_name("WebhookSource"), "webhooksource");
    }

    #[test]
    fn test_child_name_short_names_are_kept() {
        assert_eq!(child_name("widget-", "w1"), "widget-w1");
    }

    #[test]
    fn test_child_name_long_names_are_shortened_and_unique() {
        let long_a = "a".repeat(80);
        let long_b = format!("{}b", "a".repeat(79));

        let a = child_name("widget-", &long_a);
        let b = child_name("widget-", &long_b);

        assert!(a.len() <= MAX_OBJECT_NAME_LENGTH);
        assert!(b.len() <= MAX_OBJECT_NAME_LENGTH);
        assert!(a.starts_with("widget-aaa"));
        assert_ne!(a, b);
        assert_eq!(a, child_name("widget-", &long_a), "must be deterministic");
    }

    #[test]
    fn test_adapter_name_single_tenant_vs_multi_tenant() {
        assert_eq!(adapter_name(&widget("w1")), "widget-w1");
        assert_eq!(adapter_name(&filter("f1")), "filter-adapter");
        assert_eq!(adapter_name(&filter("f2")), "filter-adapter");
    }

    #[test]
    fn test_service_account_name_shared_or_private() {
        let shared = widget("w1");
        assert_eq!(service_account_name(&shared), "widget-adapter");

        let mut private = widget("w2");
        private.spec.own_identity = true;
        assert_eq!(service_account_name(&private), "widget-i-w2");
    }

    #[test]
    fn test_identity_labels_include_instance_only_when_single_tenant() {
        let w = identity_labels(&widget("w1"));
        assert_eq!(w.get(K8S_INSTANCE).map(String::as_str), Some("w1"));
        assert_eq!(w.get(K8S_NAME).map(String::as_str), Some("widget"));

        let f = identity_labels(&filter("f1"));
        assert!(!f.contains_key(K8S_INSTANCE));
        assert_eq!(f, common_labels("Filter"));
    }

    #[test]
    fn test_label_selector_rendering() {
        let labels = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert_eq!(label_selector(&labels), "a=1,b=2");
    }

    #[test]
    fn test_for_instance_requires_uid() {
        let mut obj = widget("w1");
        obj.metadata.uid = None;
        let err = AdapterTemplate::for_instance(&obj, WIDGET_IMAGE, None).unwrap_err();
        assert!(matches!(err, BuildError::MissingUid(_)));
    }

    #[test]
    fn test_into_deployment_single_tenant() {
        let obj = widget("w1");
        let deployment = AdapterTemplate::for_instance(&obj, WIDGET_IMAGE, Some(&sink()))
            .unwrap()
            .with_env("EXTRA", "x")
            .into_deployment();

        assert_eq!(deployment.metadata.name.as_deref(), Some("widget-w1"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some(NAMESPACE));

        let owners = deployment.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, obj.metadata.uid.clone().unwrap());
        assert_eq!(owners[0].controller, Some(true));

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.selector.match_labels.as_ref(), Some(&identity_labels(&obj)));

        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.service_account_name.as_deref(), Some("widget-adapter"));
        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some(WIDGET_IMAGE));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, METRICS_PORT);

        let env = deployment_env(&deployment);
        assert_eq!(env_value(env, ENV_COMPONENT), Some("widget"));
        assert_eq!(env_value(env, ENV_SINK), Some(sink().as_str()));
        assert_eq!(env_value(env, "EXTRA"), Some("x"));
        assert_eq!(env_value(env, ENV_NAME), None);
        assert_eq!(env_value(env, ENV_METRICS_PROMETHEUS_PORT), None);
    }

    #[test]
    fn test_into_deployment_without_sink_has_no_sink_env() {
        let deployment = AdapterTemplate::for_instance(&widget("w1"), WIDGET_IMAGE, None)
            .unwrap()
            .into_deployment();
        assert_eq!(env_value(deployment_env(&deployment), ENV_SINK), None);
    }

    #[test]
    fn test_into_kn_service_is_cluster_local_by_default() {
        let svc = AdapterTemplate::for_instance(&widget("w1"), WIDGET_IMAGE, Some(&sink()))
            .unwrap()
            .into_kn_service();

        assert_eq!(
            svc.labels().get(KNATIVE_VISIBILITY_LABEL).map(String::as_str),
            Some(KNATIVE_VISIBILITY_CLUSTER_LOCAL)
        );
        let env = svc.spec.template.spec.containers[0].env.as_deref().unwrap();
        assert_eq!(env_value(env, ENV_NAMESPACE), Some(NAMESPACE));
        assert_eq!(env_value(env, ENV_NAME), Some("w1"));
        assert_eq!(env_value(env, ENV_METRICS_PROMETHEUS_PORT), Some("9092"));
        assert!(svc.spec.template.spec.containers[0].ports.is_none());
    }

    #[test]
    fn test_into_kn_service_multi_tenant_env() {
        let svc = AdapterTemplate::for_instance(&filter("f1"), "img", Some(&sink()))
            .unwrap()
            .into_kn_service();

        assert_eq!(svc.metadata.name.as_deref(), Some("filter-adapter"));
        let env = svc.spec.template.spec.containers[0].env.as_deref().unwrap();
        assert_eq!(env_value(env, ENV_SYSTEM_NAMESPACE), Some(NAMESPACE));
        assert_eq!(env_value(env, ENV_SINK), None);
        assert_eq!(env_value(env, ENV_NAME), None);
    }

    #[test]
    fn test_overrides_are_applied_last() {
        let mut obj: Widget = widget("w1");
        obj.spec.color = "red".to_string();
        obj.metadata.labels = Some(BTreeMap::from([
            (SWITCHYARD_TENANT_LABEL.to_string(), "team-a".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]));
        let overrides = AdapterOverrides {
            public: Some(true),
            env: vec![env_var("LOG_LEVEL", "debug")],
            resources: None,
            tolerations: vec![Toleration {
                key: Some("dedicated".to_string()),
                operator: Some("Exists".to_string()),
                ..Default::default()
            }],
        };

        let mut template = AdapterTemplate::for_instance(&obj, WIDGET_IMAGE, None).unwrap();
        template.override_env = overrides.env.clone();
        template.tolerations = overrides.tolerations.clone();
        template.public = true;
        let svc = template.with_env("WIDGET_COLOR", "red").into_kn_service();

        assert!(!svc.labels().contains_key(KNATIVE_VISIBILITY_LABEL));
        assert_eq!(
            svc.labels().get(SWITCHYARD_TENANT_LABEL).map(String::as_str),
            Some("team-a")
        );
        assert!(!svc.labels().contains_key("unrelated"));

        let pod = &svc.spec.template.spec;
        let env = pod.containers[0].env.as_deref().unwrap();
        assert_eq!(env.last().map(|e| e.name.as_str()), Some("LOG_LEVEL"));
        assert_eq!(pod.tolerations.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_shared_workload_ignores_instance_labels_and_overrides() {
        let mut obj = filter("f1");
        obj.metadata.labels = Some(BTreeMap::from([(
            SWITCHYARD_TENANT_LABEL.to_string(),
            "team-a".to_string(),
        )]));
        obj.spec.adapter_overrides = Some(AdapterOverrides {
            public: Some(true),
            env: vec![env_var("LOG_LEVEL", "debug")],
            resources: None,
            tolerations: vec![Toleration {
                key: Some("dedicated".to_string()),
                operator: Some("Exists".to_string()),
                ..Default::default()
            }],
        });

        let svc = AdapterTemplate::for_instance(&obj, "img", None)
            .unwrap()
            .into_kn_service();

        assert!(!svc.labels().contains_key(SWITCHYARD_TENANT_LABEL));
        assert_eq!(
            svc.labels().get(KNATIVE_VISIBILITY_LABEL).map(String::as_str),
            Some(KNATIVE_VISIBILITY_CLUSTER_LOCAL)
        );
        let pod = &svc.spec.template.spec;
        let env = pod.containers[0].env.as_deref().unwrap();
        assert_eq!(env_value(env, "LOG_LEVEL"), None);
        assert!(pod.tolerations.is_none());
    }

    #[test]
    fn test_workload_set_controller_replaces_owners() {
        let mut workload = Workload::Pool(
            AdapterTemplate::for_instance(&widget("w1"), WIDGET_IMAGE, None)
                .unwrap()
                .into_deployment(),
        );
        let owner = OwnerReference {
            api_version: "v1".to_string(),
            kind: "ServiceAccount".to_string(),
            name: "widget-adapter".to_string(),
            uid: "sa-uid".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };

        workload.set_controller(owner.clone());

        assert_eq!(workload.meta().owner_references, Some(vec![owner]));
    }
}

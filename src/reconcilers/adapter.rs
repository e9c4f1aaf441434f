// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired state of adapter workloads.
//!
//! Builders start from an [`AdapterTemplate`], which carries everything every
//! adapter has in common (name, identity labels, owner, identity, standard
//! environment, overrides), add their kind-specific environment, and project it
//! into one of the two [`Workload`] flavors.
//!
//! # Naming
//!
//! | Object | Single-tenant | Multi-tenant |
//! |---|---|---|
//! | workload | `<component>-<instance>` | `<component>-adapter` |
//! | `ServiceAccount` | `<component>-adapter` | `<component>-adapter` |
//!
//! where `<component>` is the lower-cased kind. Kinds that want a private
//! identity use `<component>-i-<instance>` for their `ServiceAccount`. Names
//! longer than 63 characters are shortened by [`child_name`].

use crate::constants::{
    ADAPTER_CONTAINER_NAME, COMPONENT_ADAPTER, ENV_COMPONENT, ENV_METRICS_PROMETHEUS_PORT,
    ENV_NAME, ENV_NAMESPACE, ENV_SINK, ENV_SYSTEM_NAMESPACE, MAX_OBJECT_NAME_LENGTH,
    METRICS_PORT, METRICS_PORT_NAME, METRICS_PORT_ON_DEMAND,
};
use crate::crd::AdapterOverrides;
use crate::knative::{KnService, KnServiceSpec, RevisionTemplateSpec};
use crate::labels::{
    K8S_COMPONENT, K8S_INSTANCE, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF,
    KNATIVE_VISIBILITY_CLUSTER_LOCAL, KNATIVE_VISIBILITY_LABEL, MANAGED_BY_SWITCHYARD,
    PART_OF_SWITCHYARD, PROPAGATED_LABELS,
};
use crate::reconcilers::reconcilable::{BuildError, Reconcilable};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements, Toleration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

/// Length of the hash suffix of shortened names
const NAME_HASH_LENGTH: usize = 32;

/// Container termination message policy surfacing crash output in pod status
const TERMINATION_MESSAGE_POLICY: &str = "FallbackToLogsOnError";

/// Component name of a kind: its lower-cased name.
#[must_use]
pub fn component_name(kind: &str) -> String {
    kind.to_lowercase()
}

/// Name of a child object: `prefix + name`, shortened to a valid object name.
///
/// Names that fit in 63 characters are returned as is. Longer names are
/// truncated and suffixed with a hash of the full name so that distinct
/// inputs keep yielding distinct names.
#[must_use]
pub fn child_name(prefix: &str, name: &str) -> String {
    let full = format!("{prefix}{name}");
    if full.len() <= MAX_OBJECT_NAME_LENGTH {
        return full;
    }

    let digest = Sha256::digest(full.as_bytes());
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    let keep = MAX_OBJECT_NAME_LENGTH - NAME_HASH_LENGTH;
    let head: String = full.chars().take(keep).collect();
    let head = head.trim_end_matches(['-', '.']);

    format!("{head}{}", &hash[..NAME_HASH_LENGTH])
}

/// Name of the objects shared by all instances of a kind in a namespace.
#[must_use]
pub fn shared_adapter_name(kind: &str) -> String {
    format!("{}-{COMPONENT_ADAPTER}", component_name(kind))
}

/// Name of the adapter workload of an instance.
#[must_use]
pub fn adapter_name<T: Reconcilable>(obj: &T) -> String {
    if T::MULTI_TENANT {
        shared_adapter_name(T::KIND)
    } else {
        child_name(&format!("{}-", component_name(T::KIND)), &obj.name_any())
    }
}

/// Name of the `ServiceAccount` the adapter of an instance runs as.
#[must_use]
pub fn service_account_name<T: Reconcilable>(obj: &T) -> String {
    if obj.wants_own_service_account() {
        child_name(&format!("{}-i-", component_name(T::KIND)), &obj.name_any())
    } else {
        shared_adapter_name(T::KIND)
    }
}

/// Labels carried by every object the engine manages for a kind.
#[must_use]
pub fn common_labels(kind: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_NAME.to_string(), component_name(kind)),
        (K8S_COMPONENT.to_string(), COMPONENT_ADAPTER.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_SWITCHYARD.to_string()),
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_SWITCHYARD.to_string()),
    ])
}

/// Labels identifying the adapter workload of an instance.
///
/// The set is unique per instance for single-tenant kinds, and per kind and
/// namespace for multi-tenant kinds.
#[must_use]
pub fn identity_labels<T: Reconcilable>(obj: &T) -> BTreeMap<String, String> {
    let mut labels = common_labels(T::KIND);
    if !T::MULTI_TENANT {
        labels.insert(K8S_INSTANCE.to_string(), obj.name_any());
    }
    labels
}

/// Render labels as an equality-based label selector.
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Environment variable with a literal value.
#[must_use]
pub fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Desired adapter workload, in one of its two flavors.
#[derive(Clone, Debug)]
pub enum Workload {
    /// Fixed pool of replicas, restarted on crash.
    Pool(Deployment),
    /// Request-driven, scaled to zero when idle.
    OnDemand(KnService),
}

impl Workload {
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Pool(d) => d.meta(),
            Self::OnDemand(s) => s.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Pool(d) => d.meta_mut(),
            Self::OnDemand(s) => s.meta_mut(),
        }
    }

    /// Make `owner` the only owner and controller of the workload.
    pub fn set_controller(&mut self, owner: OwnerReference) {
        self.meta_mut().owner_references = Some(vec![owner]);
    }
}

/// Fields shared by both workload flavors.
#[derive(Clone, Debug)]
pub struct AdapterTemplate {
    pub name: String,
    pub namespace: String,
    /// Labels of the workload object and of its pods
    pub labels: BTreeMap<String, String>,
    /// Immutable subset of `labels` selecting the pods
    pub selector: BTreeMap<String, String>,
    pub owner: OwnerReference,
    pub service_account_name: String,
    pub image: String,
    pub env: Vec<EnvVar>,
    /// Environment only set on on-demand workloads
    pub on_demand_env: Vec<EnvVar>,
    pub override_env: Vec<EnvVar>,
    pub resources: Option<ResourceRequirements>,
    pub tolerations: Vec<Toleration>,
    pub public: bool,
}

impl AdapterTemplate {
    /// Standard adapter for an instance.
    ///
    /// Label propagation and `spec.adapterOverrides` only apply to
    /// single-tenant kinds.
    ///
    /// The environment contains `K_COMPONENT`, plus `K_SINK` (when a sink is
    /// resolved) for single-tenant kinds, or `NAMESPACE` and
    /// `SYSTEM_NAMESPACE` for multi-tenant kinds. On-demand workloads also get
    /// `METRICS_PROMETHEUS_PORT`, and `NAMESPACE` and `NAME` when single-tenant.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingUid`] if the instance has not been persisted.
    pub fn for_instance<T: Reconcilable>(
        obj: &T,
        image: &str,
        sink: Option<&Url>,
    ) -> Result<Self, BuildError> {
        let namespace = obj.namespace().unwrap_or_default();
        let owner = obj
            .controller_owner_ref(&())
            .ok_or_else(|| BuildError::MissingUid(format!("{} {}", T::KIND, obj.name_any())))?;

        let selector = identity_labels(obj);
        let mut labels = selector.clone();
        // A shared workload is owned by every instance of the namespace, so
        // nothing of a single instance may leak into it.
        if !T::MULTI_TENANT {
            let instance_labels = obj.labels();
            for key in PROPAGATED_LABELS {
                if let Some(value) = instance_labels.get(*key) {
                    labels.insert((*key).to_string(), value.clone());
                }
            }
        }

        let mut env = vec![env_var(ENV_COMPONENT, component_name(T::KIND))];
        let mut on_demand_env = Vec::new();
        if T::MULTI_TENANT {
            env.push(env_var(ENV_NAMESPACE, namespace.clone()));
            env.push(env_var(ENV_SYSTEM_NAMESPACE, namespace.clone()));
        } else {
            if let Some(sink) = sink {
                env.push(env_var(ENV_SINK, sink.as_str()));
            }
            on_demand_env.push(env_var(ENV_NAMESPACE, namespace.clone()));
            on_demand_env.push(env_var(ENV_NAME, obj.name_any()));
        }
        on_demand_env.push(env_var(
            ENV_METRICS_PROMETHEUS_PORT,
            METRICS_PORT_ON_DEMAND.to_string(),
        ));

        let overrides = if T::MULTI_TENANT {
            AdapterOverrides::default()
        } else {
            obj.adapter_overrides().cloned().unwrap_or_default()
        };

        Ok(Self {
            name: adapter_name(obj),
            namespace,
            labels,
            selector,
            owner,
            service_account_name: service_account_name(obj),
            image: image.to_string(),
            env,
            on_demand_env,
            override_env: overrides.env,
            resources: overrides.resources,
            tolerations: overrides.tolerations,
            public: overrides.public.unwrap_or(false),
        })
    }

    /// Append a kind-specific environment variable.
    #[must_use]
    pub fn with_env(mut self, name: &str, value: impl Into<String>) -> Self {
        self.env.push(env_var(name, value));
        self
    }

    fn metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels.clone()),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }

    fn container(&self, extra_env: Vec<EnvVar>, ports: Option<Vec<ContainerPort>>) -> Container {
        let mut env = self.env.clone();
        env.extend(extra_env);
        env.extend(self.override_env.iter().cloned());

        Container {
            name: ADAPTER_CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            env: Some(env),
            ports,
            resources: self.resources.clone(),
            termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
            ..Default::default()
        }
    }

    fn tolerations(&self) -> Option<Vec<Toleration>> {
        (!self.tolerations.is_empty()).then(|| self.tolerations.clone())
    }

    /// Project into a pool workload.
    #[must_use]
    pub fn into_deployment(self) -> Deployment {
        let container = self.container(
            Vec::new(),
            Some(vec![ContainerPort {
                name: Some(METRICS_PORT_NAME.to_string()),
                container_port: METRICS_PORT,
                ..Default::default()
            }]),
        );

        Deployment {
            metadata: self.metadata(),
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(self.selector.clone()),
                    match_expressions: None,
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(self.service_account_name.clone()),
                        containers: vec![container],
                        tolerations: self.tolerations(),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }

    /// Project into an on-demand workload.
    ///
    /// The service is cluster-local unless the instance asks to be public.
    #[must_use]
    pub fn into_kn_service(self) -> KnService {
        let container = self.container(self.on_demand_env.clone(), None);

        let mut metadata = self.metadata();
        if !self.public {
            metadata.labels.get_or_insert_with(BTreeMap::new).insert(
                KNATIVE_VISIBILITY_LABEL.to_string(),
                KNATIVE_VISIBILITY_CLUSTER_LOCAL.to_string(),
            );
        }

        let mut service = KnService::new(
            &self.name,
            KnServiceSpec {
                template: RevisionTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.labels.clone()),
                        ..Default::default()
                    }),
                    spec: PodSpec {
                        service_account_name: Some(self.service_account_name.clone()),
                        containers: vec![container],
                        tolerations: self.tolerations(),
                        ..Default::default()
                    },
                },
            },
        );
        service.metadata = metadata;
        service
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod adapter_tests;

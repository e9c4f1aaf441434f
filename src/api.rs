// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to the Kubernetes API used by the adapter engine.
//!
//! The engine only needs a handful of verbs per object kind, so it talks to
//! the API server through the narrow [`ObjectApi`] and [`AddressResolver`]
//! traits. Production code uses the kube-backed implementations below; unit
//! tests use in-memory fakes with the same server semantics.

use crate::crd::KReference;
use crate::reconcilers::retry::retry_api_call;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::{GroupVersionKind, NamespaceResourceScope};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Namespaced read/write access to one object kind.
#[async_trait]
pub trait ObjectApi<K>: Send + Sync {
    /// Get an object, or `None` if it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error>;

    /// List the objects of a namespace matching a label selector.
    ///
    /// An empty selector matches every object.
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error>;

    async fn create(&self, namespace: &str, obj: &K) -> Result<K, kube::Error>;

    /// Replace an object. The write is rejected with a conflict when
    /// `obj.metadata.resourceVersion` is stale.
    async fn replace(&self, namespace: &str, name: &str, obj: &K) -> Result<K, kube::Error>;

    /// Merge-patch the status subresource with `{"status": status}`.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), kube::Error>;
}

/// [`ObjectApi`] backed by a kube [`Client`].
pub struct KubeObjectApi<K> {
    client: Client,
    field_manager: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeObjectApi<K> {
    #[must_use]
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
            _kind: PhantomData,
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }
}

#[async_trait]
impl<K> ObjectApi<K> for KubeObjectApi<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(
            || api.get_opt(name),
            &format!("get {} {namespace}/{name}", K::kind(&())),
        )
        .await
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = if label_selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(label_selector)
        };
        let list = retry_api_call(
            || api.list(&params),
            &format!("list {} in {namespace}", K::kind(&())),
        )
        .await?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&self.post_params(), obj).await
    }

    async fn replace(&self, namespace: &str, name: &str, obj: &K) -> Result<K, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &self.post_params(), obj).await
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Resolves references to addressable objects.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Return the URL exposed by the referenced object.
    ///
    /// `Ok(None)` means the object exists but does not expose an address
    /// (yet). A missing object is reported as a 404 API error.
    async fn address_of(
        &self,
        namespace: &str,
        reference: &KReference,
    ) -> Result<Option<String>, kube::Error>;
}

/// [`AddressResolver`] using API discovery to read `status.address.url` of
/// arbitrary kinds.
pub struct KubeAddressResolver {
    client: Client,
    cluster_domain: String,
}

impl KubeAddressResolver {
    #[must_use]
    pub fn new(client: Client, cluster_domain: &str) -> Self {
        Self {
            client,
            cluster_domain: cluster_domain.to_string(),
        }
    }
}

#[async_trait]
impl AddressResolver for KubeAddressResolver {
    async fn address_of(
        &self,
        namespace: &str,
        reference: &KReference,
    ) -> Result<Option<String>, kube::Error> {
        if reference.api_version == "v1" && reference.kind == "Service" {
            let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
            api.get(&reference.name).await?;
            return Ok(Some(service_url(
                &reference.name,
                namespace,
                &self.cluster_domain,
            )));
        }

        let (group, version) = split_api_version(&reference.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &reference.kind);
        let (resource, _caps) = retry_api_call(
            || kube::discovery::pinned_kind(&self.client, &gvk),
            &format!("discover {}", reference.kind),
        )
        .await?;

        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        let obj = api.get(&reference.name).await?;

        let url = obj
            .data
            .pointer("/status/address/url")
            .and_then(serde_json::Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        debug!(
            kind = %reference.kind,
            namespace = %namespace,
            name = %reference.name,
            url = ?url,
            "Resolved address of addressable object"
        );
        Ok(url)
    }
}

/// Cluster-local URL of a core `Service`.
#[must_use]
pub fn service_url(name: &str, namespace: &str, cluster_domain: &str) -> String {
    format!("http://{name}.{namespace}.svc.{cluster_domain}")
}

/// Split an `apiVersion` into its group (empty for the core group) and version.
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;

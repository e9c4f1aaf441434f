// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory stand-ins for the Kubernetes API, used by the engine tests.
//!
//! [`FakeObjectApi`] keeps the server behaviors the engine depends on: UID
//! and resourceVersion assignment, `AlreadyExists` on duplicate creates,
//! `Conflict` on stale writes, status preserved across spec writes, and
//! label-selector lists. Every verb can be made to fail.

use crate::api::{AddressResolver, ObjectApi};
use crate::context::Context;
use crate::crd::{AdapterStatus, CloudEventAttributes, Destination, KReference};
use crate::errors::ReconcileEvent;
use crate::events::EventPublisher;
use crate::knative::KnService;
use crate::reconcilers::adapter::{AdapterTemplate, Workload};
use crate::reconcilers::reconcilable::{AdapterBuilder, BuildError, Reconcilable, SinkSupport};
use crate::reconcilers::retry::BackoffTracker;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ObjectReference, Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const NAMESPACE: &str = "default";
pub const WIDGET_IMAGE: &str = "registry.example.com/widget-adapter:v1";
pub const BROKER_URL: &str = "http://broker-ingress.default.svc.cluster.local/default/default";

/// Build an API error response like the API server does.
pub fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
    kube::Error::Api(
        kube::core::Status::failure(message, reason)
            .with_code(code)
            .boxed(),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Replace,
    PatchStatus,
}

static UID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a UID unique within the test binary.
pub fn new_uid() -> String {
    format!("uid-{:08}", UID_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// RFC 7386 JSON merge patch.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
            None => labels.contains_key(term),
        })
}

/// In-memory [`ObjectApi`].
pub struct FakeObjectApi<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    failures: Mutex<HashMap<Verb, u16>>,
    racing_create: Mutex<Option<K>>,
    version: AtomicU64,
    creates: AtomicUsize,
    replaces: AtomicUsize,
    status_patches: AtomicUsize,
}

impl<K> Default for FakeObjectApi<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(HashMap::new()),
            racing_create: Mutex::new(None),
            version: AtomicU64::new(1),
            creates: AtomicUsize::new(0),
            replaces: AtomicUsize::new(0),
            status_patches: AtomicUsize::new(0),
        }
    }
}

impl<K> FakeObjectApi<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        self.version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn injected(&self, verb: Verb) -> Result<(), kube::Error> {
        match self.failures.lock().unwrap().get(&verb) {
            Some(&code) => Err(api_error(code, "Injected", &format!("injected {verb:?} failure"))),
            None => Ok(()),
        }
    }

    /// Make every call of `verb` fail with `code` until cleared.
    pub fn fail(&self, verb: Verb, code: u16) {
        self.failures.lock().unwrap().insert(verb, code);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Have someone else create `obj` right before the next create call.
    pub fn race_next_create(&self, obj: K) {
        *self.racing_create.lock().unwrap() = Some(obj);
    }

    /// Store an object as if it had been created by someone else.
    ///
    /// Missing UID and resourceVersion are assigned. Write counters are not touched.
    pub fn insert(&self, mut obj: K) -> K {
        let meta = obj.meta_mut();
        meta.uid.get_or_insert_with(new_uid);
        meta.generation.get_or_insert(1);
        meta.resource_version = Some(self.next_version());
        let key = (obj.namespace().unwrap_or_default(), obj.name_any());
        self.objects.lock().unwrap().insert(key, obj.clone());
        obj
    }

    /// Mutate a stored object out of band, e.g. to simulate another
    /// controller writing its status.
    pub fn modify(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let version = self.next_version();
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("object must exist");
        f(obj);
        obj.meta_mut().resource_version = Some(version);
    }

    pub fn remove(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
    }

    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn objects(&self) -> Vec<K> {
        self.objects.lock().unwrap().values().cloned().collect()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn status_patches(&self) -> usize {
        self.status_patches.load(Ordering::SeqCst)
    }

    /// Creates, replaces and status patches.
    pub fn writes(&self) -> usize {
        self.creates() + self.replaces() + self.status_patches()
    }
}

#[async_trait]
impl<K> ObjectApi<K> for FakeObjectApi<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        self.injected(Verb::Get)?;
        Ok(self.object(namespace, name))
    }

    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error> {
        self.injected(Verb::List)?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), obj)| ns == namespace && selector_matches(label_selector, obj.labels()))
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K, kube::Error> {
        self.injected(Verb::Create)?;
        if let Some(racing) = self.racing_create.lock().unwrap().take() {
            self.insert(racing);
        }
        let key = (namespace.to_string(), obj.name_any());
        if self.objects.lock().unwrap().contains_key(&key) {
            return Err(api_error(
                409,
                "AlreadyExists",
                &format!("{:?} already exists", key.1),
            ));
        }

        let mut created = obj.clone();
        let meta = created.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid = Some(new_uid());
        meta.generation = Some(1);
        meta.resource_version = Some(self.next_version());

        self.objects.lock().unwrap().insert(key, created.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn replace(&self, namespace: &str, name: &str, obj: &K) -> Result<K, kube::Error> {
        self.injected(Verb::Replace)?;
        let key = (namespace.to_string(), name.to_string());
        let Some(stored) = self.object(namespace, name) else {
            return Err(api_error(404, "NotFound", &format!("{name:?} not found")));
        };
        if obj.resource_version().is_some() && obj.resource_version() != stored.resource_version() {
            return Err(api_error(
                409,
                "Conflict",
                "the object has been modified; please apply your changes to the latest version and try again",
            ));
        }

        // Status is owned by the status subresource and ignored by spec writes.
        let stored_value = serde_json::to_value(&stored).unwrap();
        let mut new_value = serde_json::to_value(obj).unwrap();
        match stored_value.get("status") {
            Some(status) => new_value["status"] = status.clone(),
            None => {
                if let Value::Object(map) = &mut new_value {
                    map.remove("status");
                }
            }
        }
        let spec_changed = stored_value.get("spec") != new_value.get("spec");
        let mut replaced: K = serde_json::from_value(new_value).unwrap();

        let meta = replaced.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid.clone_from(&stored.meta().uid);
        meta.generation = Some(stored.meta().generation.unwrap_or(1) + i64::from(spec_changed));
        meta.resource_version = Some(self.next_version());

        self.objects.lock().unwrap().insert(key, replaced.clone());
        self.replaces.fetch_add(1, Ordering::SeqCst);
        Ok(replaced)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &Value,
    ) -> Result<(), kube::Error> {
        self.injected(Verb::PatchStatus)?;
        let Some(stored) = self.object(namespace, name) else {
            return Err(api_error(404, "NotFound", &format!("{name:?} not found")));
        };
        let mut value = serde_json::to_value(&stored).unwrap();
        merge_patch(&mut value, &serde_json::json!({ "status": status }));
        let mut patched: K = serde_json::from_value(value).unwrap();
        patched.meta_mut().resource_version = Some(self.next_version());

        self.objects
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), patched);
        self.status_patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What the fake resolver answers for a referenced object.
#[derive(Clone, Debug)]
pub enum FakeAddress {
    Url(String),
    NoAddress,
    Error(u16),
}

/// [`AddressResolver`] answering from a fixed table. Unknown objects are 404.
#[derive(Default)]
pub struct FakeResolver {
    addresses: Mutex<HashMap<(String, String, String), FakeAddress>>,
}

impl FakeResolver {
    pub fn set(&self, namespace: &str, kind: &str, name: &str, address: FakeAddress) {
        self.addresses.lock().unwrap().insert(
            (namespace.to_string(), kind.to_string(), name.to_string()),
            address,
        );
    }
}

#[async_trait]
impl AddressResolver for FakeResolver {
    async fn address_of(
        &self,
        namespace: &str,
        reference: &KReference,
    ) -> Result<Option<String>, kube::Error> {
        let key = (
            namespace.to_string(),
            reference.kind.clone(),
            reference.name.clone(),
        );
        match self.addresses.lock().unwrap().get(&key) {
            Some(FakeAddress::Url(url)) => Ok(Some(url.clone())),
            Some(FakeAddress::NoAddress) => Ok(None),
            Some(FakeAddress::Error(code)) => {
                Err(api_error(*code, "Injected", "injected lookup failure"))
            }
            None => Err(api_error(
                404,
                "NotFound",
                &format!("{} {:?} not found", reference.kind, reference.name),
            )),
        }
    }
}

/// [`EventPublisher`] keeping every event in memory.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<(ObjectReference, ReconcileEvent)>>,
}

impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<(ObjectReference, ReconcileEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|(_, event)| event.reason)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, event: &ReconcileEvent) {
        self.events
            .lock()
            .unwrap()
            .push((resource_ref.clone(), event.clone()));
    }
}

/// Fakes behind a [`Context`], kept around for inspection.
pub struct Harness {
    pub ctx: Arc<Context>,
    pub service_accounts: Arc<FakeObjectApi<ServiceAccount>>,
    pub role_bindings: Arc<FakeObjectApi<RoleBinding>>,
    pub deployments: Arc<FakeObjectApi<Deployment>>,
    pub kn_services: Arc<FakeObjectApi<KnService>>,
    pub pods: Arc<FakeObjectApi<Pod>>,
    pub resolver: Arc<FakeResolver>,
    pub events: Arc<RecordingEventPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        let service_accounts = Arc::new(FakeObjectApi::new());
        let role_bindings = Arc::new(FakeObjectApi::new());
        let deployments = Arc::new(FakeObjectApi::new());
        let kn_services = Arc::new(FakeObjectApi::new());
        let pods = Arc::new(FakeObjectApi::new());
        let resolver = Arc::new(FakeResolver::default());
        let events = Arc::new(RecordingEventPublisher::default());

        resolver.set(
            NAMESPACE,
            "Broker",
            "default",
            FakeAddress::Url(BROKER_URL.to_string()),
        );

        let ctx = Arc::new(Context {
            service_accounts: service_accounts.clone(),
            role_bindings: role_bindings.clone(),
            deployments: deployments.clone(),
            kn_services: kn_services.clone(),
            pods: pods.clone(),
            resolver: resolver.clone(),
            events: events.clone(),
            backoff: BackoffTracker::default(),
        });

        Self {
            ctx,
            service_accounts,
            role_bindings,
            deployments,
            kn_services,
            pods,
            resolver,
            events,
        }
    }

    /// Writes across every child object kind.
    pub fn child_writes(&self) -> usize {
        self.service_accounts.writes()
            + self.role_bindings.writes()
            + self.deployments.writes()
            + self.kn_services.writes()
    }
}

/// Sink pointing at the default broker of the test namespace.
pub fn broker_sink() -> Destination {
    Destination {
        r#ref: Some(KReference {
            api_version: "eventing.knative.dev/v1".to_string(),
            kind: "Broker".to_string(),
            name: "default".to_string(),
            namespace: None,
        }),
        uri: None,
    }
}

/// Test-only kind exercising the options the sample kinds leave unused.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "test.switchyard.io",
    version = "v1",
    kind = "Widget",
    namespaced,
    status = "AdapterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    #[serde(default)]
    pub sink: Option<Destination>,
    #[serde(default)]
    pub own_identity: bool,
    #[serde(default)]
    pub color: String,
}

impl Reconcilable for Widget {
    const KIND: &'static str = "Widget";
    const SINK: SinkSupport = SinkSupport::Required;

    fn sink(&self) -> Option<&Destination> {
        self.spec.sink.as_ref()
    }

    fn adapter_status(&self) -> Option<&AdapterStatus> {
        self.status.as_ref()
    }

    fn emitted_event_types(&self) -> Vec<CloudEventAttributes> {
        vec![CloudEventAttributes {
            r#type: "io.switchyard.widget.tick".to_string(),
            source: format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any()),
        }]
    }

    fn wants_own_service_account(&self) -> bool {
        self.spec.own_identity
    }
}

/// Builder of widget adapters; pool or on-demand depending on the flag.
pub struct WidgetAdapter {
    pub on_demand: bool,
}

impl AdapterBuilder<Widget> for WidgetAdapter {
    fn build_adapter(&self, obj: &Widget, sink: Option<&Url>) -> Result<Workload, BuildError> {
        if obj.spec.color.is_empty() {
            return Err(BuildError::MissingField("color"));
        }
        let template = AdapterTemplate::for_instance(obj, WIDGET_IMAGE, sink)?
            .with_env("WIDGET_COLOR", &obj.spec.color);
        Ok(if self.on_demand {
            Workload::OnDemand(template.into_kn_service())
        } else {
            Workload::Pool(template.into_deployment())
        })
    }
}

/// A persisted widget with a sink on the default broker.
pub fn widget(name: &str) -> Widget {
    let mut obj = Widget::new(
        name,
        WidgetSpec {
            sink: Some(broker_sink()),
            own_identity: false,
            color: "blue".to_string(),
        },
    );
    obj.metadata.namespace = Some(NAMESPACE.to_string());
    obj.metadata.uid = Some(new_uid());
    obj.metadata.generation = Some(1);
    obj
}

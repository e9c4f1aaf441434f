// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Engine bindings of the resource kinds shipped with the operator.
//!
//! Each kind implements [`Reconcilable`] and gets an [`AdapterBuilder`]
//! holding the adapter image it runs:
//!
//! | Kind | Tenancy | Workload | Sink |
//! |---|---|---|---|
//! | [`WebhookSource`] | single | `Deployment` | required |
//! | [`HttpTarget`] | single | Knative `Service` | optional (replies) |
//! | [`Filter`] | multi | Knative `Service` | required |

use crate::constants::{KIND_FILTER, KIND_HTTP_TARGET, KIND_WEBHOOK_SOURCE};
use crate::crd::{
    AdapterOverrides, AdapterStatus, CloudEventAttributes, Destination, Filter, HttpTarget,
    WebhookSource,
};
use crate::reconcilers::adapter::{AdapterTemplate, Workload};
use crate::reconcilers::reconcilable::{AdapterBuilder, BuildError, Reconcilable, SinkSupport};
use kube::ResourceExt;
use url::Url;

/// Type of the events `HttpTarget` accepts
pub const HTTP_REQUEST_EVENT_TYPE: &str = "io.switchyard.http.request";

/// Method used by `HttpTarget` when none is set
pub const DEFAULT_HTTP_METHOD: &str = "POST";

const ENV_WEBHOOK_EVENT_TYPE: &str = "WEBHOOK_EVENT_TYPE";
const ENV_WEBHOOK_EVENT_SOURCE: &str = "WEBHOOK_EVENT_SOURCE";
const ENV_WEBHOOK_BASICAUTH_USERNAME: &str = "WEBHOOK_BASICAUTH_USERNAME";
const ENV_HTTP_ENDPOINT: &str = "HTTP_ENDPOINT";
const ENV_HTTP_METHOD: &str = "HTTP_METHOD";

// WebhookSource

impl Reconcilable for WebhookSource {
    const KIND: &'static str = KIND_WEBHOOK_SOURCE;
    const SINK: SinkSupport = SinkSupport::Required;

    fn sink(&self) -> Option<&Destination> {
        self.spec.sink.as_ref()
    }

    fn adapter_status(&self) -> Option<&AdapterStatus> {
        self.status.as_ref()
    }

    fn adapter_overrides(&self) -> Option<&AdapterOverrides> {
        self.spec.adapter_overrides.as_ref()
    }

    fn emitted_event_types(&self) -> Vec<CloudEventAttributes> {
        if self.spec.event_type.is_empty() {
            return Vec::new();
        }
        vec![CloudEventAttributes {
            r#type: self.spec.event_type.clone(),
            source: webhook_event_source(self),
        }]
    }
}

/// `source` attribute of the events emitted by a webhook.
fn webhook_event_source(obj: &WebhookSource) -> String {
    obj.spec
        .event_source
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any()))
}

/// Runs each `WebhookSource` as a `Deployment` serving its HTTP endpoint.
#[derive(Clone, Debug)]
pub struct WebhookSourceAdapter {
    image: String,
}

impl WebhookSourceAdapter {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl AdapterBuilder<WebhookSource> for WebhookSourceAdapter {
    fn build_adapter(
        &self,
        obj: &WebhookSource,
        sink: Option<&Url>,
    ) -> Result<Workload, BuildError> {
        if obj.spec.event_type.is_empty() {
            return Err(BuildError::MissingField("eventType"));
        }

        let mut template = AdapterTemplate::for_instance(obj, &self.image, sink)?
            .with_env(ENV_WEBHOOK_EVENT_TYPE, obj.spec.event_type.as_str())
            .with_env(ENV_WEBHOOK_EVENT_SOURCE, webhook_event_source(obj));
        if let Some(username) = obj.spec.basic_auth_username.as_deref() {
            template = template.with_env(ENV_WEBHOOK_BASICAUTH_USERNAME, username);
        }

        Ok(Workload::Pool(template.into_deployment()))
    }
}

// HttpTarget

impl Reconcilable for HttpTarget {
    const KIND: &'static str = KIND_HTTP_TARGET;
    const SINK: SinkSupport = SinkSupport::Optional;

    fn sink(&self) -> Option<&Destination> {
        self.spec.sink.as_ref()
    }

    fn adapter_status(&self) -> Option<&AdapterStatus> {
        self.status.as_ref()
    }

    fn adapter_overrides(&self) -> Option<&AdapterOverrides> {
        self.spec.adapter_overrides.as_ref()
    }

    fn accepted_event_types(&self) -> Vec<String> {
        vec![HTTP_REQUEST_EVENT_TYPE.to_string()]
    }
}

/// Runs each `HttpTarget` as a scale-to-zero Knative `Service`.
#[derive(Clone, Debug)]
pub struct HttpTargetAdapter {
    image: String,
}

impl HttpTargetAdapter {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl AdapterBuilder<HttpTarget> for HttpTargetAdapter {
    fn build_adapter(&self, obj: &HttpTarget, sink: Option<&Url>) -> Result<Workload, BuildError> {
        if obj.spec.endpoint.is_empty() {
            return Err(BuildError::MissingField("endpoint"));
        }
        let endpoint = Url::parse(&obj.spec.endpoint).map_err(|e| {
            BuildError::Invalid(format!("spec.endpoint {:?}: {e}", obj.spec.endpoint))
        })?;
        let method = obj
            .spec
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(|| DEFAULT_HTTP_METHOD.to_string(), str::to_uppercase);

        let template = AdapterTemplate::for_instance(obj, &self.image, sink)?
            .with_env(ENV_HTTP_ENDPOINT, endpoint.as_str())
            .with_env(ENV_HTTP_METHOD, method);

        Ok(Workload::OnDemand(template.into_kn_service()))
    }
}

// Filter

impl Reconcilable for Filter {
    const KIND: &'static str = KIND_FILTER;
    const MULTI_TENANT: bool = true;
    const SINK: SinkSupport = SinkSupport::Required;

    fn sink(&self) -> Option<&Destination> {
        self.spec.sink.as_ref()
    }

    fn adapter_status(&self) -> Option<&AdapterStatus> {
        self.status.as_ref()
    }

    fn adapter_overrides(&self) -> Option<&AdapterOverrides> {
        self.spec.adapter_overrides.as_ref()
    }
}

/// Runs one shared Knative `Service` serving every `Filter` of a namespace.
///
/// The shared adapter reads the expression and sink of each filter from the
/// API, so nothing instance-specific goes into its environment.
#[derive(Clone, Debug)]
pub struct FilterAdapter {
    image: String,
}

impl FilterAdapter {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

impl AdapterBuilder<Filter> for FilterAdapter {
    fn build_adapter(&self, obj: &Filter, sink: Option<&Url>) -> Result<Workload, BuildError> {
        if obj.spec.expression.trim().is_empty() {
            return Err(BuildError::MissingField("expression"));
        }
        let template = AdapterTemplate::for_instance(obj, &self.image, sink)?;
        Ok(Workload::OnDemand(template.into_kn_service()))
    }
}

#[cfg(test)]
#[path = "adapters_tests.rs"]
mod adapters_tests;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;

pub const KAFKA_SOURCE_API_VERSION: &str = "sources.knative.dev/v1beta1";
pub const KAFKA_SOURCE_KIND: &str = "KafkaSource";
pub const SINK_SERVICE_API_VERSION: &str = "serving.knative.dev/v1";
pub const SINK_SERVICE_KIND: &str = "Service";
pub const CONFIG_MAP_API_VERSION: &str = "v1";
pub const CONFIG_MAP_KIND: &str = "ConfigMap";

const CONFIG_MAP_REQUEST_KEY: &str = "request";
const CONFIG_MAP_BOOTSTRAP_KEY: &str = "bootstrapServers";

#[derive(Debug, Clone)]
pub struct ClusterClientConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

impl ClusterClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster_client_base_url_missing")]
    BaseUrlMissing,
    #[error("cluster_client_invalid_path")]
    InvalidPath,
    #[error("cluster_conflict:{resource}")]
    Conflict { resource: String },
    #[error("cluster_not_found:{resource}")]
    NotFound { resource: String },
    #[error("cluster_unavailable:{message}")]
    Unavailable { message: String },
    #[error("cluster_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("cluster_read_failed:{message}")]
    Read { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
}

/// Knative KafkaSource manifest binding a topic to a sink service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSourceDescriptor {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: KafkaSourceSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KafkaSourceSpec {
    pub initial_offset: String,
    pub bootstrap_servers: Vec<String>,
    pub topics: Vec<String>,
    pub sink: KafkaSourceSink,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KafkaSourceSink {
    #[serde(rename = "ref")]
    pub reference: SinkReference,
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SinkReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl KafkaSourceDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        topic: impl Into<String>,
        bootstrap_servers: Vec<String>,
        sink_service: impl Into<String>,
        sink_uri: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            api_version: KAFKA_SOURCE_API_VERSION.to_string(),
            kind: KAFKA_SOURCE_KIND.to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.clone(),
            },
            spec: KafkaSourceSpec {
                initial_offset: "latest".to_string(),
                bootstrap_servers,
                topics: vec![topic.into()],
                sink: KafkaSourceSink {
                    reference: SinkReference {
                        api_version: SINK_SERVICE_API_VERSION.to_string(),
                        kind: SINK_SERVICE_KIND.to_string(),
                        name: sink_service.into(),
                        namespace,
                    },
                    uri: sink_uri.into(),
                },
            },
        }
    }
}

/// ConfigMap manifest holding the verbatim provisioning request so the
/// sink service can retrieve its parameters after activation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapDescriptor {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
}

impl ConfigMapDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        request_payload: impl Into<String>,
        bootstrap_servers: impl Into<String>,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert(CONFIG_MAP_REQUEST_KEY.to_string(), request_payload.into());
        data.insert(CONFIG_MAP_BOOTSTRAP_KEY.to_string(), bootstrap_servers.into());
        Self {
            api_version: CONFIG_MAP_API_VERSION.to_string(),
            kind: CONFIG_MAP_KIND.to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
            },
            data,
        }
    }
}

/// The four cluster operations the reconciler depends on. Every failure
/// is classified so callers can absorb it without inspecting transport
/// details.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn create_subscription(
        &self,
        descriptor: &KafkaSourceDescriptor,
    ) -> Result<(), ClusterError>;

    async fn delete_subscription(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn create_config_artifact(
        &self,
        descriptor: &ConfigMapDescriptor,
    ) -> Result<(), ClusterError>;

    async fn delete_config_artifact(&self, namespace: &str, name: &str)
    -> Result<(), ClusterError>;
}

#[derive(Debug, Clone)]
pub struct ClusterClient {
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
}

impl ClusterClient {
    pub fn new(config: ClusterClientConfig) -> Result<Self, ClusterError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            bearer_token: config
                .bearer_token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    #[must_use]
    pub fn kafka_sources_path(namespace: &str) -> String {
        format!(
            "/apis/sources.knative.dev/v1beta1/namespaces/{}/kafkasources",
            namespace.trim()
        )
    }

    #[must_use]
    pub fn kafka_source_path(namespace: &str, name: &str) -> String {
        format!(
            "/apis/sources.knative.dev/v1beta1/namespaces/{}/kafkasources/{}",
            namespace.trim(),
            name.trim()
        )
    }

    #[must_use]
    pub fn config_maps_path(namespace: &str) -> String {
        format!("/api/v1/namespaces/{}/configmaps", namespace.trim())
    }

    #[must_use]
    pub fn config_map_path(namespace: &str, name: &str) -> String {
        format!(
            "/api/v1/namespaces/{}/configmaps/{}",
            namespace.trim(),
            name.trim()
        )
    }

    async fn create_resource<T: Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
        resource: String,
    ) -> Result<(), ClusterError> {
        let url = self.endpoint(path).ok_or(ClusterError::InvalidPath)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..self.request_attempts {
            let mut request = self
                .http
                .post(url.as_str())
                .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
                .timeout(self.timeout)
                .json(body);
            if let Some(token) = self.bearer_token.as_deref() {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => return classify_response(response, resource).await,
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }

        Err(ClusterError::Unavailable {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn delete_resource(&self, path: &str, resource: String) -> Result<(), ClusterError> {
        let url = self.endpoint(path).ok_or(ClusterError::InvalidPath)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..self.request_attempts {
            let mut request = self
                .http
                .delete(url.as_str())
                .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
                .timeout(self.timeout);
            if let Some(token) = self.bearer_token.as_deref() {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => return classify_response(response, resource).await,
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }

        Err(ClusterError::Unavailable {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl ResourceClient for ClusterClient {
    async fn create_subscription(
        &self,
        descriptor: &KafkaSourceDescriptor,
    ) -> Result<(), ClusterError> {
        let namespace = descriptor.metadata.namespace.as_str();
        let resource = format!("kafkasources/{}/{}", namespace, descriptor.metadata.name);
        self.create_resource(&Self::kafka_sources_path(namespace), descriptor, resource)
            .await
    }

    async fn delete_subscription(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let resource = format!("kafkasources/{namespace}/{name}");
        self.delete_resource(&Self::kafka_source_path(namespace, name), resource)
            .await
    }

    async fn create_config_artifact(
        &self,
        descriptor: &ConfigMapDescriptor,
    ) -> Result<(), ClusterError> {
        let namespace = descriptor.metadata.namespace.as_str();
        let resource = format!("configmaps/{}/{}", namespace, descriptor.metadata.name);
        self.create_resource(&Self::config_maps_path(namespace), descriptor, resource)
            .await
    }

    async fn delete_config_artifact(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let resource = format!("configmaps/{namespace}/{name}");
        self.delete_resource(&Self::config_map_path(namespace, name), resource)
            .await
    }
}

pub fn classify_status(status: StatusCode, body: &[u8], resource: String) -> ClusterError {
    match status {
        StatusCode::CONFLICT => ClusterError::Conflict { resource },
        StatusCode::NOT_FOUND => ClusterError::NotFound { resource },
        _ => {
            let body = non_empty_string(String::from_utf8_lossy(body).to_string())
                .unwrap_or_else(|| "<empty>".to_string());
            ClusterError::Http { status, body }
        }
    }
}

async fn classify_response(response: reqwest::Response, resource: String) -> Result<(), ClusterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let bytes = response.bytes().await.map_err(|error| ClusterError::Read {
        message: error.to_string(),
    })?;
    Err(classify_status(status, &bytes, resource))
}

fn normalize_base_url(base_url: &str) -> Result<String, ClusterError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ClusterError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = ClusterClient::new(ClusterClientConfig::new(
            "https://kubernetes.default.svc/",
        ))
        .expect("cluster client");

        assert_eq!(
            client.endpoint("/api/v1/namespaces/ns1/configmaps"),
            Some("https://kubernetes.default.svc/api/v1/namespaces/ns1/configmaps".to_string())
        );
        assert_eq!(
            client.endpoint("api/v1/namespaces/ns1/configmaps"),
            Some("https://kubernetes.default.svc/api/v1/namespaces/ns1/configmaps".to_string())
        );
        assert_eq!(client.endpoint(""), None);
    }

    #[test]
    fn path_helpers_are_deterministic() {
        assert_eq!(
            ClusterClient::kafka_sources_path("ns1"),
            "/apis/sources.knative.dev/v1beta1/namespaces/ns1/kafkasources"
        );
        assert_eq!(
            ClusterClient::kafka_source_path("ns1", "mytopic1"),
            "/apis/sources.knative.dev/v1beta1/namespaces/ns1/kafkasources/mytopic1"
        );
        assert_eq!(
            ClusterClient::config_maps_path("ns1"),
            "/api/v1/namespaces/ns1/configmaps"
        );
        assert_eq!(
            ClusterClient::config_map_path("ns1", "json-config-mytopic1"),
            "/api/v1/namespaces/ns1/configmaps/json-config-mytopic1"
        );
    }

    #[test]
    fn status_classification_maps_conflict_and_absence() {
        let conflict = classify_status(
            StatusCode::CONFLICT,
            b"AlreadyExists",
            "kafkasources/ns1/mytopic1".to_string(),
        );
        assert!(matches!(conflict, ClusterError::Conflict { .. }));
        assert_eq!(
            conflict.to_string(),
            "cluster_conflict:kafkasources/ns1/mytopic1"
        );

        let absent = classify_status(
            StatusCode::NOT_FOUND,
            b"NotFound",
            "configmaps/ns1/json-config-mytopic1".to_string(),
        );
        assert!(matches!(absent, ClusterError::NotFound { .. }));

        let other = classify_status(StatusCode::BAD_GATEWAY, b" gateway failed ", String::new());
        assert_eq!(
            other.to_string(),
            "cluster_http_502 Bad Gateway:gateway failed"
        );

        let empty_body = classify_status(StatusCode::SERVICE_UNAVAILABLE, b" ", String::new());
        assert_eq!(
            empty_body.to_string(),
            "cluster_http_503 Service Unavailable:<empty>"
        );
    }

    #[test]
    fn base_url_missing_is_rejected() {
        let result = ClusterClient::new(ClusterClientConfig::new("   "));
        assert!(matches!(result, Err(ClusterError::BaseUrlMissing)));
    }

    #[test]
    fn kafka_source_descriptor_serializes_to_wire_shape() {
        let descriptor = KafkaSourceDescriptor::new(
            "mytopic1",
            "ns1",
            "my.topic-1",
            vec!["kafka-external.dev.apps.eo4eu.eu:9092".to_string()],
            "svc",
            "/json-config-mytopic1",
        );
        let value = serde_json::to_value(&descriptor).expect("serialize");
        assert_eq!(value["apiVersion"], "sources.knative.dev/v1beta1");
        assert_eq!(value["kind"], "KafkaSource");
        assert_eq!(value["metadata"]["name"], "mytopic1");
        assert_eq!(value["metadata"]["namespace"], "ns1");
        assert_eq!(value["spec"]["initialOffset"], "latest");
        assert_eq!(value["spec"]["topics"][0], "my.topic-1");
        assert_eq!(value["spec"]["sink"]["ref"]["apiVersion"], "serving.knative.dev/v1");
        assert_eq!(value["spec"]["sink"]["ref"]["kind"], "Service");
        assert_eq!(value["spec"]["sink"]["ref"]["name"], "svc");
        assert_eq!(value["spec"]["sink"]["ref"]["namespace"], "ns1");
        assert_eq!(value["spec"]["sink"]["uri"], "/json-config-mytopic1");
    }

    #[test]
    fn config_map_descriptor_carries_payload_and_bootstrap() {
        let descriptor = ConfigMapDescriptor::new(
            "json-config-mytopic1",
            "ns1",
            r#"{"workflow_status":"published"}"#,
            "kafka-external.dev.apps.eo4eu.eu:9092",
        );
        let value = serde_json::to_value(&descriptor).expect("serialize");
        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "ConfigMap");
        assert_eq!(value["metadata"]["name"], "json-config-mytopic1");
        assert_eq!(value["data"]["request"], r#"{"workflow_status":"published"}"#);
        assert_eq!(
            value["data"]["bootstrapServers"],
            "kafka-external.dev.apps.eo4eu.eu:9092"
        );
    }
}

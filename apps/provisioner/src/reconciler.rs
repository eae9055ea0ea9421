//! Resource-lifecycle reconciliation.
//!
//! Maps a classified workflow event onto cluster side effects: a
//! KafkaSource subscription paired with a ConfigMap artifact, created
//! and destroyed together under the same sanitized topic name. Every
//! operational failure is absorbed here — degraded to a warning and an
//! audit event — so a malformed or duplicate event can never take the
//! controller down or leak an error to the webhook caller.

use std::sync::Arc;

use streamsource_cluster_client::{
    ClusterError, ConfigMapDescriptor, KafkaSourceDescriptor, ResourceClient,
};

use crate::names;
use crate::observability::{AuditEvent, Observability};

#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn ResourceClient>,
    bootstrap_servers: String,
    observability: Observability,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        client: Arc<dyn ResourceClient>,
        bootstrap_servers: impl Into<String>,
        observability: Observability,
    ) -> Self {
        Self {
            client,
            bootstrap_servers: bootstrap_servers.into(),
            observability,
        }
    }

    /// Provisions the subscription/artifact pair for a published workflow.
    ///
    /// The artifact is created first so it already exists if the
    /// subscription's consumer queries it immediately on activation. A
    /// failure between the two creates leaves an orphaned artifact; that
    /// is accepted and logged, never rolled back. Conflicts mean a
    /// duplicate event already provisioned the resource and are absorbed.
    pub async fn create(
        &self,
        input_topic: &str,
        namespace: &str,
        service_name: &str,
        raw_payload: &str,
        request_id: &str,
    ) {
        let name = names::sanitize(input_topic);
        if names::was_truncated(input_topic) {
            tracing::warn!(
                topic = %input_topic,
                resource_name = %name,
                "topic name truncated to 60 characters; collisions with other long topics are possible"
            );
        }
        let artifact_name = names::config_artifact_name(&name);

        let artifact = ConfigMapDescriptor::new(
            artifact_name.as_str(),
            namespace,
            raw_payload,
            self.bootstrap_servers.as_str(),
        );
        let subscription = KafkaSourceDescriptor::new(
            name.as_str(),
            namespace,
            input_topic,
            vec![self.bootstrap_servers.clone()],
            service_name.to_lowercase(),
            names::routing_path(&name),
        );

        match self.client.create_config_artifact(&artifact).await {
            Ok(()) => {}
            Err(ClusterError::Conflict { resource }) => {
                tracing::info!(%resource, "config artifact already exists; continuing");
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    namespace,
                    artifact = %artifact_name,
                    "config artifact create failed; skipping subscription create"
                );
                self.observability.audit(
                    AuditEvent::new("reconcile.create.failed", request_id)
                        .with_attribute("namespace", namespace)
                        .with_attribute("resource_name", name.as_str())
                        .with_attribute("stage", "config_artifact")
                        .with_attribute("error", error.to_string()),
                );
                return;
            }
        }

        match self.client.create_subscription(&subscription).await {
            Ok(()) => {}
            Err(ClusterError::Conflict { resource }) => {
                tracing::info!(%resource, "subscription already exists");
            }
            Err(error) => {
                // The artifact created above stays behind; there is no
                // transactional rollback for the pair.
                tracing::warn!(
                    %error,
                    namespace,
                    subscription = %name,
                    "subscription create failed; config artifact left in place"
                );
                self.observability.audit(
                    AuditEvent::new("reconcile.create.failed", request_id)
                        .with_attribute("namespace", namespace)
                        .with_attribute("resource_name", name.as_str())
                        .with_attribute("stage", "subscription")
                        .with_attribute("error", error.to_string()),
                );
                return;
            }
        }

        tracing::info!(namespace, subscription = %name, artifact = %artifact_name, "resources created");
        self.observability.audit(
            AuditEvent::new("reconcile.create.applied", request_id)
                .with_attribute("namespace", namespace)
                .with_attribute("resource_name", name),
        );
    }

    /// Tears down the subscription/artifact pair for a stopping workflow.
    ///
    /// Both deletes are attempted independently: a failure on the
    /// subscription delete must not strand the artifact. An already
    /// absent resource counts as deleted.
    pub async fn delete(&self, namespace: &str, input_topic: &str, request_id: &str) {
        let name = names::sanitize(input_topic);
        let artifact_name = names::config_artifact_name(&name);

        let subscription_failure =
            match self.client.delete_subscription(namespace, &name).await {
                Ok(()) => {
                    tracing::info!(namespace, subscription = %name, "subscription deleted");
                    None
                }
                Err(ClusterError::NotFound { resource }) => {
                    tracing::info!(%resource, "subscription already absent");
                    None
                }
                Err(error) => {
                    tracing::warn!(%error, namespace, subscription = %name, "subscription delete failed");
                    Some(error)
                }
            };

        let artifact_failure = match self
            .client
            .delete_config_artifact(namespace, &artifact_name)
            .await
        {
            Ok(()) => {
                tracing::info!(namespace, artifact = %artifact_name, "config artifact deleted");
                None
            }
            Err(ClusterError::NotFound { resource }) => {
                tracing::info!(%resource, "config artifact already absent");
                None
            }
            Err(error) => {
                tracing::warn!(%error, namespace, artifact = %artifact_name, "config artifact delete failed");
                Some(error)
            }
        };

        if subscription_failure.is_none() && artifact_failure.is_none() {
            self.observability.audit(
                AuditEvent::new("reconcile.delete.applied", request_id)
                    .with_attribute("namespace", namespace)
                    .with_attribute("resource_name", name),
            );
            return;
        }

        let mut event = AuditEvent::new("reconcile.delete.failed", request_id)
            .with_attribute("namespace", namespace)
            .with_attribute("resource_name", name);
        if let Some(error) = subscription_failure {
            event = event.with_attribute("subscription_error", error.to_string());
        }
        if let Some(error) = artifact_failure {
            event = event.with_attribute("artifact_error", error.to_string());
        }
        self.observability.audit(event);
    }
}

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod event;
pub mod names;
pub mod observability;
pub mod reconciler;


use streamsource_cluster_client::{
    ClusterClient, ClusterClientConfig, ClusterError, ResourceClient,
};

use crate::config::Config;
use crate::event::{WorkflowEvent, parse_event};
use crate::observability::Observability;
use crate::reconciler::Reconciler;

pub const SERVICE_NAME: &str = "streamsource-provisioner";

/// Acknowledgment bodies are fixed strings the upstream workflow engine
/// matches on; it discards the message either way and only the success
/// status code matters.
pub const ACK_VALID: &str = "Received message And valid";
pub const ACK_PROBLEM: &str = "There was a problem ignoring";

const REQUEST_TIMEOUT_SECONDS: u64 = 30;
const HEADER_REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reconciler: Reconciler,
    pub observability: Observability,
}

#[derive(Debug, Serialize)]
struct Acknowledgment {
    msg: &'static str,
}

pub fn build_router(config: Config) -> Result<Router, ClusterError> {
    let client = ClusterClient::new(ClusterClientConfig {
        base_url: config.cluster_api_base_url.clone(),
        bearer_token: config.cluster_api_token.clone(),
        timeout_ms: config.cluster_timeout_ms,
        request_attempts: config.cluster_request_attempts,
    })?;
    Ok(build_router_with_client(
        config,
        Arc::new(client),
        Observability::default(),
    ))
}

pub fn build_router_with_client(
    config: Config,
    client: Arc<dyn ResourceClient>,
    observability: Observability,
) -> Router {
    let reconciler = Reconciler::new(
        client,
        config.bootstrap_servers.clone(),
        observability.clone(),
    );
    let state = AppState {
        config: Arc::new(config),
        reconciler,
        observability,
    };

    Router::new()
        .route("/", post(handle_workflow_event))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    REQUEST_TIMEOUT_SECONDS,
                ))),
        )
        .with_state(state)
}

/// The webhook entry point. Parses the envelope, routes it to the
/// reconciler, and acknowledges with `200 OK` no matter what happened:
/// the event source treats the message as consumed regardless of
/// processing outcome, so failure is only ever signaled through logs
/// and audit events. Discarding the error detail here, at the single
/// outermost boundary, is the intentional design, not an accident.
async fn handle_workflow_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let request_id = request_id(&headers);
    tracing::debug!(bytes = body.len(), request_id = %request_id, "workflow event received");

    match parse_event(&body) {
        Ok(Some(WorkflowEvent::Published {
            input_topic,
            output_topic,
            service_name,
            namespace,
        })) => {
            tracing::debug!(
                %input_topic,
                %output_topic,
                %service_name,
                %namespace,
                "publish event accepted"
            );
            let raw_payload = String::from_utf8_lossy(&body).to_string();
            state
                .reconciler
                .create(
                    &input_topic,
                    &namespace,
                    &service_name,
                    &raw_payload,
                    &request_id,
                )
                .await;
            state.observability.increment_counter("webhook.event.accepted");
            ack(ACK_VALID)
        }
        Ok(Some(WorkflowEvent::Stopping {
            workflow_name,
            input_topic,
            namespace,
        })) => {
            tracing::debug!(%workflow_name, %input_topic, %namespace, "stop event accepted");
            state
                .reconciler
                .delete(&namespace, &input_topic, &request_id)
                .await;
            state.observability.increment_counter("webhook.event.accepted");
            ack(ACK_VALID)
        }
        Ok(None) => {
            tracing::debug!(request_id = %request_id, "unrecognized workflow status; no action");
            state.observability.increment_counter("webhook.event.ignored");
            ack(ACK_VALID)
        }
        Err(error) => {
            tracing::warn!(%error, request_id = %request_id, "discarding malformed workflow event");
            state.observability.increment_counter("webhook.event.malformed");
            ack(ACK_PROBLEM)
        }
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": SERVICE_NAME }))
}

fn ack(msg: &'static str) -> (StatusCode, Json<Acknowledgment>) {
    (StatusCode::OK, Json(Acknowledgment { msg }))
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

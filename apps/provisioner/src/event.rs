//! Inbound webhook envelope parsing and classification.

use serde::Deserialize;
use thiserror::Error;

pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_STOPPING: &str = "stopping";

/// The wire envelope posted by the workflow engine. Section casing is
/// dictated by the upstream producer and must not change.
#[derive(Debug, Deserialize)]
struct Envelope {
    workflow_status: String,
    #[serde(default)]
    workflow_name: Option<String>,
    #[serde(rename = "Topics", default)]
    topics: Option<TopicsSection>,
    #[serde(rename = "ML", default)]
    ml: Option<MlSection>,
}

#[derive(Debug, Deserialize)]
struct TopicsSection {
    #[serde(rename = "in", default)]
    input: Option<String>,
    #[serde(rename = "out", default)]
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MlSection {
    #[serde(rename = "ServiceName", default)]
    service_name: Option<String>,
    #[serde(rename = "Namespace", default)]
    namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Published {
        input_topic: String,
        output_topic: String,
        service_name: String,
        namespace: String,
    },
    Stopping {
        workflow_name: String,
        input_topic: String,
        namespace: String,
    },
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid event json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required field {0}")]
    MissingField(&'static str),
}

/// Parses and minimally validates a raw webhook body.
///
/// Returns `Ok(None)` for envelopes whose `workflow_status` is valid
/// JSON but matches no known lifecycle phase; those are ignored without
/// any resource action.
pub fn parse_event(raw: &[u8]) -> Result<Option<WorkflowEvent>, EventParseError> {
    let envelope: Envelope = serde_json::from_slice(raw)?;

    match envelope.workflow_status.as_str() {
        STATUS_PUBLISHED => {
            let topics = envelope
                .topics
                .ok_or(EventParseError::MissingField("Topics"))?;
            let ml = envelope.ml.ok_or(EventParseError::MissingField("ML"))?;
            Ok(Some(WorkflowEvent::Published {
                input_topic: required(topics.input, "Topics.in")?,
                output_topic: required(topics.output, "Topics.out")?,
                service_name: required(ml.service_name, "ML.ServiceName")?,
                namespace: required(ml.namespace, "ML.Namespace")?,
            }))
        }
        STATUS_STOPPING => {
            let topics = envelope
                .topics
                .ok_or(EventParseError::MissingField("Topics"))?;
            let ml = envelope.ml.ok_or(EventParseError::MissingField("ML"))?;
            Ok(Some(WorkflowEvent::Stopping {
                workflow_name: required(envelope.workflow_name, "workflow_name")?,
                input_topic: required(topics.input, "Topics.in")?,
                namespace: required(ml.namespace, "ML.Namespace")?,
            }))
        }
        _ => Ok(None),
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, EventParseError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(EventParseError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_published_envelope() {
        let raw = br#"{
            "workflow_status": "published",
            "Topics": {"in": "my.topic-1", "out": "out1"},
            "ML": {"ServiceName": "Svc", "Namespace": "ns1"}
        }"#;
        let event = parse_event(raw).expect("parse").expect("classified");
        assert_eq!(
            event,
            WorkflowEvent::Published {
                input_topic: "my.topic-1".to_string(),
                output_topic: "out1".to_string(),
                service_name: "Svc".to_string(),
                namespace: "ns1".to_string(),
            }
        );
    }

    #[test]
    fn parses_stopping_envelope() {
        let raw = br#"{
            "workflow_status": "stopping",
            "workflow_name": "wf",
            "Topics": {"in": "my.topic-1"},
            "ML": {"Namespace": "ns1"}
        }"#;
        let event = parse_event(raw).expect("parse").expect("classified");
        assert_eq!(
            event,
            WorkflowEvent::Stopping {
                workflow_name: "wf".to_string(),
                input_topic: "my.topic-1".to_string(),
                namespace: "ns1".to_string(),
            }
        );
    }

    #[test]
    fn unknown_status_is_ignored_not_rejected() {
        let raw = br#"{"workflow_status": "paused"}"#;
        assert!(parse_event(raw).expect("parse").is_none());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(EventParseError::Json(_))
        ));
    }

    #[test]
    fn missing_input_topic_is_an_error() {
        let raw = br#"{
            "workflow_status": "published",
            "Topics": {"out": "out1"},
            "ML": {"ServiceName": "svc", "Namespace": "ns1"}
        }"#;
        assert!(matches!(
            parse_event(raw),
            Err(EventParseError::MissingField("Topics.in"))
        ));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let raw = br#"{
            "workflow_status": "stopping",
            "workflow_name": "   ",
            "Topics": {"in": "t"},
            "ML": {"Namespace": "ns1"}
        }"#;
        assert!(matches!(
            parse_event(raw),
            Err(EventParseError::MissingField("workflow_name"))
        ));
    }

    #[test]
    fn stopping_does_not_require_service_name_or_output_topic() {
        let raw = br#"{
            "workflow_status": "stopping",
            "workflow_name": "wf",
            "Topics": {"in": "t"},
            "ML": {"Namespace": "ns1"}
        }"#;
        assert!(parse_event(raw).expect("parse").is_some());
    }
}

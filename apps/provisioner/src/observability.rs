//! Structured audit events and counters.
//!
//! The provisioner never signals failure to its HTTP caller, so the
//! audit trail is the only place reconciliation outcomes are visible.
//! The default sink forwards to `tracing`; tests swap in a recording
//! sink to assert on emitted events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub request_id: String,
    pub recorded_at: DateTime<Utc>,
    pub attributes: Vec<(String, String)>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            request_id: request_id.into(),
            recorded_at: Utc::now(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "audit",
            action = %event.action,
            request_id = %event.request_id,
            recorded_at = %event.recorded_at.to_rfc3339(),
            attributes = ?event.attributes,
            "audit event"
        );
    }
}

#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }
}

#[derive(Clone)]
pub struct Observability {
    sink: Arc<dyn AuditSink>,
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl Default for Observability {
    fn default() -> Self {
        Self::with_sink(Arc::new(TracingAuditSink))
    }
}

impl Observability {
    #[must_use]
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn audit(&self, event: AuditEvent) {
        self.sink.record(&event);
    }

    pub fn increment_counter(&self, name: &str) {
        if let Ok(mut guard) = self.counters.lock() {
            *guard.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|guard| guard.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = Arc::new(RecordingAuditSink::default());
        let observability = Observability::with_sink(sink.clone());

        observability.audit(
            AuditEvent::new("reconcile.create.applied", "req-1")
                .with_attribute("namespace", "ns1"),
        );
        observability.audit(AuditEvent::new("reconcile.delete.applied", "req-2"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "reconcile.create.applied");
        assert_eq!(events[0].attribute("namespace"), Some("ns1"));
        assert_eq!(events[1].request_id, "req-2");
    }

    #[test]
    fn counters_accumulate() {
        let observability = Observability::default();
        observability.increment_counter("webhook.event.accepted");
        observability.increment_counter("webhook.event.accepted");
        assert_eq!(observability.counter("webhook.event.accepted"), 2);
        assert_eq!(observability.counter("webhook.event.malformed"), 0);
    }
}

//! Derives cluster-legal resource names from arbitrary topic identifiers.
//!
//! The transform is deterministic but not collision-free: two distinct
//! topics that agree on their first 60 sanitized characters map to the
//! same name. The reconciler logs when truncation kicks in so the risk
//! is at least visible in the audit trail.

pub const CONFIG_ARTIFACT_PREFIX: &str = "json-config-";
pub const MAX_RESOURCE_NAME_LEN: usize = 60;

/// Lowercases the topic, strips `-` and `.`, and truncates to 60 chars.
#[must_use]
pub fn sanitize(topic: &str) -> String {
    topic
        .to_lowercase()
        .chars()
        .filter(|ch| *ch != '-' && *ch != '.')
        .take(MAX_RESOURCE_NAME_LEN)
        .collect()
}

/// Whether [`sanitize`] dropped trailing characters for this topic.
#[must_use]
pub fn was_truncated(topic: &str) -> bool {
    topic
        .to_lowercase()
        .chars()
        .filter(|ch| *ch != '-' && *ch != '.')
        .count()
        > MAX_RESOURCE_NAME_LEN
}

#[must_use]
pub fn config_artifact_name(sanitized: &str) -> String {
    format!("{CONFIG_ARTIFACT_PREFIX}{sanitized}")
}

/// Routing path the sink service uses to locate its paired artifact.
#[must_use]
pub fn routing_path(sanitized: &str) -> String {
    format!("/{CONFIG_ARTIFACT_PREFIX}{sanitized}")
}

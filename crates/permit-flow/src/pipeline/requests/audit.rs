use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::domain::{ActorKind, AuditEntry, AuditOperation};
use super::repository::AuditTrail;

/// Actor and transport metadata attached to every audit entry.
#[derive(Debug, Clone, Default)]
pub struct AuditOrigin {
    pub actor: Option<String>,
    pub actor_kind: Option<ActorKind>,
    pub ip: Option<String>,
    pub client: Option<String>,
}

impl AuditOrigin {
    pub fn staff(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            actor_kind: Some(ActorKind::Staff),
            ..Self::default()
        }
    }

    pub fn system() -> Self {
        Self {
            actor: None,
            actor_kind: Some(ActorKind::System),
            ..Self::default()
        }
    }
}

/// Best-effort writer for the compliance audit trail.
///
/// Every write swallows its own failure (logged, never raised) so the primary
/// operation it documents cannot be rolled back by a misbehaving sink.
pub struct AuditWriter {
    trail: Arc<dyn AuditTrail>,
}

impl AuditWriter {
    pub fn new(trail: Arc<dyn AuditTrail>) -> Self {
        Self { trail }
    }

    pub fn record(
        &self,
        table: &str,
        record_id: &str,
        operation: AuditOperation,
        before: Option<Value>,
        after: Option<Value>,
        origin: &AuditOrigin,
    ) {
        let entry = AuditEntry {
            table: table.to_string(),
            record_id: record_id.to_string(),
            operation,
            before,
            after,
            actor: origin.actor.clone(),
            actor_kind: origin.actor_kind.unwrap_or(ActorKind::System),
            origin_ip: origin.ip.clone(),
            client: origin.client.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(err) = self.trail.record(entry) {
            warn!(table, record_id, error = %err, "audit entry dropped");
        }
    }

    /// Serializes a snapshot for the before/after columns, logging instead of
    /// failing when the value does not serialize.
    pub fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(error = %err, "audit snapshot not serializable");
                None
            }
        }
    }
}

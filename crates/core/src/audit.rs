use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::asset::AssetId;
use crate::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Workflow,
    Rollup,
    Asset,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(correlation_id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), actor: actor.into() }
    }

    pub fn event(
        &self,
        asset_id: Option<&AssetId>,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(
            asset_id.cloned(),
            self.correlation_id.clone(),
            event_type,
            category,
            self.actor.clone(),
            outcome,
        )
    }
}

impl Default for AuditContext {
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string(), "system")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub asset_id: Option<AssetId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        asset_id: Option<AssetId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            asset_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes every audit event to the `assetflow::audit` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let asset_id = event.asset_id.as_ref().map(AssetId::as_str).unwrap_or("none");
        let metadata = event
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");

        match event.outcome {
            AuditOutcome::Failed => tracing::warn!(
                target: "assetflow::audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                asset_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
            _ => tracing::info!(
                target: "assetflow::audit",
                event_name = %event.event_type,
                event_id = %event.event_id,
                asset_id,
                correlation_id = %event.correlation_id,
                actor = %event.actor,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit event"
            ),
        }
    }
}

/// Events collected while a transaction is open; released to a sink only after commit.
#[derive(Debug, Default)]
pub struct PendingAudit {
    events: Vec<AuditEvent>,
}

impl PendingAudit {
    pub fn push(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    pub fn flush(self, sink: &dyn AuditSink) {
        for event in self.events {
            sink.emit(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Publishes the buffered events of a committed operation, or a single `Failed` event carrying
/// the error class when the operation did not commit.
pub fn settle<T>(
    sink: &dyn AuditSink,
    context: &AuditContext,
    asset_id: Option<&AssetId>,
    event_type: &str,
    category: AuditCategory,
    result: Result<(T, PendingAudit), ApplicationError>,
) -> Result<T, ApplicationError> {
    match result {
        Ok((value, pending)) => {
            pending.flush(sink);
            Ok(value)
        }
        Err(error) => {
            tracing::warn!(
                event_name = event_type,
                correlation_id = %context.correlation_id,
                actor = %context.actor,
                error_class = error.class(),
                error = %error,
                "operation failed"
            );
            sink.emit(
                context
                    .event(asset_id, event_type, category, AuditOutcome::Failed)
                    .with_metadata("error_class", error.class())
                    .with_metadata("error", error.to_string()),
            );
            Err(error)
        }
    }
}

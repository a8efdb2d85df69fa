use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::AdminBackend;
use crate::cache::InvalidationBus;
use crate::error::{ConsoleError, ConsoleResult};
use crate::status::{plan, EntityKind, Stamp, StampField, Status, StatusChange};

/// Result of a committed status change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub kind: EntityKind,
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp_field: Option<StampField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamped_at: Option<DateTime<Utc>>,
}

/// Single choke point for status mutations: validates against the transition
/// table, writes through the backend, then invalidates dependent reads.
#[derive(Clone)]
pub struct StatusController {
    backend: Arc<dyn AdminBackend>,
    bus: InvalidationBus,
}

impl StatusController {
    pub fn new(backend: Arc<dyn AdminBackend>, bus: InvalidationBus) -> Self {
        Self { backend, bus }
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// `target` is a wire value of the entity's status enumeration
    pub async fn apply_transition(
        &self,
        kind: EntityKind,
        id: &str,
        target: &str,
    ) -> ConsoleResult<TransitionOutcome> {
        let target = Status::parse(kind, target)?;
        self.apply(kind, id, target).await
    }

    pub async fn apply(&self, kind: EntityKind, id: &str, target: Status) -> ConsoleResult<TransitionOutcome> {
        if target.kind() != kind {
            return Err(ConsoleError::InvalidStatus {
                kind: kind.to_string(),
                value: target.to_string(),
            });
        }

        let current = self.backend.current_status(kind, id).await?;

        let stamp_field = plan(current, target).map_err(|e| {
            warn!("Refused {} {} transition {} -> {}", kind, id, current, target);
            e
        })?;

        let change = StatusChange {
            from: current,
            to: target,
            stamp: stamp_field.map(|field| Stamp {
                field,
                at: Utc::now(),
            }),
        };

        self.backend.write_status(kind, id, &change).await?;
        info!("{} {} moved {} -> {}", kind, id, current, target);

        self.bus.publish(kind.dependent_scopes());

        Ok(TransitionOutcome {
            kind,
            id: id.to_string(),
            from: current.to_string(),
            to: target.to_string(),
            stamp_field,
            stamped_at: change.stamp.map(|s| s.at),
        })
    }

    /// Flip a user's active flag
    pub async fn toggle_user(&self, id: &str) -> ConsoleResult<TransitionOutcome> {
        let current = self.backend.current_status(EntityKind::User, id).await?;
        let target = match current {
            Status::User(state) => Status::User(state.toggled()),
            other => {
                return Err(ConsoleError::InvalidStatus {
                    kind: EntityKind::User.to_string(),
                    value: other.to_string(),
                })
            }
        };
        self.apply(EntityKind::User, id, target).await
    }

    /// Delete is not a status; only the backend decides whether the id exists
    pub async fn delete(&self, kind: EntityKind, id: &str) -> ConsoleResult<()> {
        self.backend.delete(kind, id).await?;
        info!("{} {} deleted", kind, id);
        self.bus.publish(kind.dependent_scopes());
        Ok(())
    }
}

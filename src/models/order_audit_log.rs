//! # Order Audit Log Model
//!
//! Immutable, append-only record of who changed an order and how. One entry
//! is written per committed transition, inside the same unit of work as the
//! order update and the sub-state history entry.
//!
//! Maps to `order_audit_logs`; the table rejects UPDATE and DELETE.

use crate::constants::{audit_actions, entity_types};
use crate::models::order::Order;
use crate::state_machine::TransitionContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditLog {
    pub audit_log_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub previous_state: serde_json::Value,
    pub new_state: serde_json::Value,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New audit entry for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderAuditLog {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub previous_state: serde_json::Value,
    pub new_state: serde_json::Value,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrderAuditLog {
    /// Audit entry for a state change between two versions of the same order
    pub fn state_change(
        before: &Order,
        after: &Order,
        actor_id: Uuid,
        reason: Option<String>,
        context: &TransitionContext,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_type: entity_types::ORDER.to_string(),
            entity_id: after.order_id,
            action: audit_actions::STATE_CHANGED.to_string(),
            actor_id,
            previous_state: before.state_snapshot(),
            new_state: after.state_snapshot(),
            reason,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            created_at,
        }
    }

    pub fn into_record(self, audit_log_id: Uuid) -> OrderAuditLog {
        OrderAuditLog {
            audit_log_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
            actor_id: self.actor_id,
            previous_state: self.previous_state,
            new_state: self.new_state,
            reason: self.reason,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        }
    }
}

//! # Order State History Model
//!
//! Append-only sub-state trail. Each committed primary-state transition adds
//! exactly one row labelled with the richer [`OrderSubState`] vocabulary.
//!
//! Maps to `order_state_history`; the table rejects UPDATE and DELETE.

use crate::state_machine::OrderSubState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStateHistory {
    pub history_id: Uuid,
    pub order_id: Uuid,
    pub from_sub_state: OrderSubState,
    pub to_sub_state: OrderSubState,
    pub actor_id: Uuid,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// New history entry for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderStateHistory {
    pub order_id: Uuid,
    pub from_sub_state: OrderSubState,
    pub to_sub_state: OrderSubState,
    pub actor_id: Uuid,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl NewOrderStateHistory {
    pub fn into_record(self, history_id: Uuid) -> OrderStateHistory {
        OrderStateHistory {
            history_id,
            order_id: self.order_id,
            from_sub_state: self.from_sub_state,
            to_sub_state: self.to_sub_state,
            actor_id: self.actor_id,
            notes: self.notes,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

//! Domain event payloads emitted by the lifecycle core.

use crate::constants::events;
use crate::state_machine::{OrderState, OrderSubState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published once per committed state transition, after the commit.
///
/// Delivery is at-most-once. Listeners must tolerate gaps and treat the
/// audit and history tables as the record of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStateChanged {
    pub order_id: Uuid,
    pub order_number: String,
    pub from_state: OrderState,
    pub to_state: OrderState,
    pub from_sub_state: OrderSubState,
    pub to_sub_state: OrderSubState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub actor_id: Uuid,
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl OrderStateChanged {
    pub fn name(&self) -> &'static str {
        events::ORDER_STATE_CHANGED
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

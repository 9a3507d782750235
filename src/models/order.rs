//! # Order Model
//!
//! The work order entity whose lifecycle is governed by the state machine.
//!
//! ## Ownership
//!
//! Outside of a transition the order row belongs to plain CRUD paths. During a
//! transition the coordinator owns it exclusively: it reads the row through an
//! open unit of work, computes an [`OrderStateUpdate`], and writes it back
//! guarded by `lock_version`.
//!
//! ## Database Schema
//!
//! Maps to the `orders` table:
//! ```sql
//! CREATE TABLE orders (
//!   order_id UUID PRIMARY KEY,
//!   order_number VARCHAR(64) NOT NULL UNIQUE,
//!   state VARCHAR(32) NOT NULL DEFAULT 'pending',
//!   assigned_to UUID,
//!   started_at TIMESTAMPTZ,
//!   completed_at TIMESTAMPTZ,
//!   lock_version BIGINT NOT NULL DEFAULT 0,
//!   -- ... descriptive columns and timestamps
//! );
//! ```

use crate::state_machine::{OrderState, OrderSubState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Scheduling priority of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl OrderPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for OrderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid order priority: {s}")),
        }
    }
}

impl Default for OrderPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A work order as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub order_number: String,
    pub description: String,
    pub client: String,
    pub state: OrderState,
    pub priority: OrderPriority,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub actual_cost: Option<f64>,
    /// Optimistic concurrency counter, bumped on every state change
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New order for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub description: String,
    pub client: String,
    pub priority: OrderPriority,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub estimated_budget: Option<f64>,
}

/// Field changes produced by a single state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStateUpdate {
    pub order_id: Uuid,
    /// Version the update was computed against; the write fails if it moved
    pub expected_version: i64,
    pub state: OrderState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Compute the update for moving this order to `to` at time `now`.
    ///
    /// Entering `execution` stamps `started_at` unless already set; entering
    /// `completed` stamps `completed_at`.
    pub fn state_update(&self, to: OrderState, now: DateTime<Utc>) -> OrderStateUpdate {
        let started_at = match (to, self.started_at) {
            (OrderState::Execution, None) => Some(now),
            (_, existing) => existing,
        };
        let completed_at = match to {
            OrderState::Completed => Some(now),
            _ => self.completed_at,
        };

        OrderStateUpdate {
            order_id: self.order_id,
            expected_version: self.lock_version,
            state: to,
            started_at,
            completed_at,
            updated_at: now,
        }
    }

    /// Apply an update, bumping the version
    pub fn with_update(&self, update: &OrderStateUpdate) -> Order {
        Order {
            state: update.state,
            started_at: update.started_at,
            completed_at: update.completed_at,
            updated_at: update.updated_at,
            lock_version: self.lock_version + 1,
            ..self.clone()
        }
    }

    /// The fields a transition may change, used for audit snapshots
    pub fn state_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state,
            "started_at": self.started_at,
            "completed_at": self.completed_at,
            "lock_version": self.lock_version,
        })
    }

    pub fn has_assigned_actor(&self) -> bool {
        self.assigned_to.is_some()
    }
}

/// Order representation returned to callers after a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: Uuid,
    pub order_number: String,
    pub state: OrderState,
    pub sub_state: OrderSubState,
    pub step_number: u8,
    pub priority: OrderPriority,
    pub assigned_to: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub lock_version: i64,
    pub updated_at: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn new(order: &Order, sub_state: OrderSubState) -> Self {
        Self {
            order_id: order.order_id,
            order_number: order.order_number.clone(),
            state: order.state,
            sub_state,
            step_number: sub_state.step_number(),
            priority: order.priority,
            assigned_to: order.assigned_to,
            started_at: order.started_at,
            completed_at: order.completed_at,
            lock_version: order.lock_version,
            updated_at: order.updated_at,
        }
    }
}

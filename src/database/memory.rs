//! # In-Memory Transition Backend
//!
//! Process-local storage for tests and embedding. A unit of work stages its
//! writes and applies them under one lock at commit, after re-checking the
//! order's `lock_version`. Dropping an uncommitted unit discards the staged
//! writes.
//!
//! Faults can be injected at each write point to exercise rollback, and a
//! concurrent writer can be simulated between load and update.
//!
//! ```rust
//! use uuid::Uuid;
//! use workorder_core::database::{FaultPoint, InMemoryBackend};
//! use workorder_core::models::{NewOrder, OrderPriority};
//! use workorder_core::state_machine::TransitionBackend;
//!
//! # tokio_test::block_on(async {
//! let backend = InMemoryBackend::new();
//! let order = backend.insert_order(NewOrder {
//!     order_number: "WO-2001".to_string(),
//!     description: "Reseal loading dock".to_string(),
//!     client: "Acme".to_string(),
//!     priority: OrderPriority::Low,
//!     assigned_to: None,
//!     created_by: Uuid::new_v4(),
//!     estimated_budget: None,
//! });
//!
//! backend.inject_fault(FaultPoint::Commit);
//! let found = backend.find_order(order.order_id).await.unwrap();
//! assert_eq!(found.map(|o| o.order_number), Some("WO-2001".to_string()));
//! # });
//! ```

use crate::models::{
    NewOrder, NewOrderAuditLog, NewOrderItem, NewOrderStateHistory, Order, OrderAuditLog,
    OrderItem, OrderStateHistory, OrderStateUpdate,
};
use crate::state_machine::errors::{PersistenceError, PersistenceResult};
use crate::state_machine::persistence::{
    AuditSink, HistorySink, ItemCountLookup, OrderStore, TransitionBackend, UnitOfWork,
};
use crate::state_machine::OrderState;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Write point at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    OrderUpdate,
    /// After the order update, before the audit entry
    AuditAppend,
    HistoryAppend,
    Commit,
}

#[derive(Debug, Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    audit_logs: Vec<OrderAuditLog>,
    history: Vec<OrderStateHistory>,
}

#[derive(Debug, Default)]
struct Injections {
    fault: Option<FaultPoint>,
    concurrent_writer: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    injections: Arc<Mutex<Injections>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an order in `pending` with version 0
    pub fn insert_order(&self, new_order: NewOrder) -> Order {
        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            order_number: new_order.order_number,
            description: new_order.description,
            client: new_order.client,
            state: OrderState::Pending,
            priority: new_order.priority,
            assigned_to: new_order.assigned_to,
            created_by: new_order.created_by,
            started_at: None,
            completed_at: None,
            estimated_budget: new_order.estimated_budget,
            actual_cost: None,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        };
        self.put_order(order.clone());
        order
    }

    /// Store an order as-is, replacing any existing row with the same id
    pub fn put_order(&self, order: Order) {
        self.state.lock().orders.insert(order.order_id, order);
    }

    pub fn insert_item(&self, new_item: NewOrderItem) -> OrderItem {
        let item = OrderItem {
            item_id: Uuid::new_v4(),
            order_id: new_item.order_id,
            description: new_item.description,
            quantity: new_item.quantity,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .items
            .entry(item.order_id)
            .or_default()
            .push(item.clone());
        item
    }

    pub fn remove_items(&self, order_id: Uuid) {
        self.state.lock().items.remove(&order_id);
    }

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.state.lock().orders.get(&order_id).cloned()
    }

    /// Audit entries for one order, oldest first
    pub fn audit_logs(&self, order_id: Uuid) -> Vec<OrderAuditLog> {
        self.state
            .lock()
            .audit_logs
            .iter()
            .filter(|entry| entry.entity_id == order_id)
            .cloned()
            .collect()
    }

    pub fn audit_count(&self) -> usize {
        self.state.lock().audit_logs.len()
    }

    pub fn history_count(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Fail the next unit of work at `point`. One-shot.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.injections.lock().fault = Some(point);
    }

    /// Bump the order's version right after the next unit loads it, as if
    /// another writer committed in between. One-shot.
    pub fn simulate_concurrent_writer(&self) {
        self.injections.lock().concurrent_writer = true;
    }
}

#[async_trait]
impl TransitionBackend for InMemoryBackend {
    async fn begin(&self) -> PersistenceResult<Box<dyn UnitOfWork>> {
        let mut injections = self.injections.lock();
        Ok(Box::new(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            fault: injections.fault.take(),
            concurrent_writer: std::mem::take(&mut injections.concurrent_writer),
            staged_order: None,
            staged_audit: Vec::new(),
            staged_history: Vec::new(),
        }))
    }

    async fn find_order(&self, order_id: Uuid) -> PersistenceResult<Option<Order>> {
        Ok(self.order(order_id))
    }

    async fn list_history(&self, order_id: Uuid) -> PersistenceResult<Vec<OrderStateHistory>> {
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .rev()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect())
    }
}

struct StagedOrder {
    order: Order,
    expected_version: i64,
}

/// Staged writes for one transition
pub struct MemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
    fault: Option<FaultPoint>,
    concurrent_writer: bool,
    staged_order: Option<StagedOrder>,
    staged_audit: Vec<OrderAuditLog>,
    staged_history: Vec<OrderStateHistory>,
}

impl MemoryUnitOfWork {
    fn trip(&self, point: FaultPoint) -> PersistenceResult<()> {
        if self.fault == Some(point) {
            return Err(PersistenceError::TransitionSaveFailed {
                reason: format!("injected fault at {point:?}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryUnitOfWork {
    async fn find_by_id(&mut self, order_id: Uuid) -> PersistenceResult<Option<Order>> {
        if let Some(staged) = &self.staged_order {
            if staged.order.order_id == order_id {
                return Ok(Some(staged.order.clone()));
            }
        }

        let mut state = self.state.lock();
        let found = state.orders.get(&order_id).cloned();
        if found.is_some() && std::mem::take(&mut self.concurrent_writer) {
            if let Some(stored) = state.orders.get_mut(&order_id) {
                stored.lock_version += 1;
                stored.updated_at = Utc::now();
            }
        }
        Ok(found)
    }

    async fn update(&mut self, update: &OrderStateUpdate) -> PersistenceResult<Order> {
        self.trip(FaultPoint::OrderUpdate)?;

        let current = match &self.staged_order {
            Some(staged) if staged.order.order_id == update.order_id => staged.order.clone(),
            _ => self
                .state
                .lock()
                .orders
                .get(&update.order_id)
                .cloned()
                .ok_or_else(|| PersistenceError::StateResolutionFailed {
                    entity_id: update.order_id.to_string(),
                })?,
        };

        if current.lock_version != update.expected_version {
            return Err(PersistenceError::ConcurrentModification {
                entity_id: update.order_id,
            });
        }

        let expected_version = self
            .staged_order
            .as_ref()
            .map_or(update.expected_version, |staged| staged.expected_version);
        let updated = current.with_update(update);
        self.staged_order = Some(StagedOrder {
            order: updated.clone(),
            expected_version,
        });
        Ok(updated)
    }
}

#[async_trait]
impl ItemCountLookup for MemoryUnitOfWork {
    async fn count_items(&mut self, order_id: Uuid) -> PersistenceResult<i64> {
        let state = self.state.lock();
        Ok(state.items.get(&order_id).map_or(0, |items| items.len() as i64))
    }
}

#[async_trait]
impl AuditSink for MemoryUnitOfWork {
    async fn append(&mut self, entry: NewOrderAuditLog) -> PersistenceResult<OrderAuditLog> {
        self.trip(FaultPoint::AuditAppend)?;
        let record = entry.into_record(Uuid::new_v4());
        self.staged_audit.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl HistorySink for MemoryUnitOfWork {
    async fn append(
        &mut self,
        entry: NewOrderStateHistory,
    ) -> PersistenceResult<OrderStateHistory> {
        self.trip(FaultPoint::HistoryAppend)?;
        let record = entry.into_record(Uuid::new_v4());
        self.staged_history.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> PersistenceResult<()> {
        self.trip(FaultPoint::Commit)?;

        let shared = Arc::clone(&self.state);
        let mut state = shared.lock();
        if let Some(staged) = &self.staged_order {
            let stored_version = state
                .orders
                .get(&staged.order.order_id)
                .map(|order| order.lock_version);
            if stored_version != Some(staged.expected_version) {
                return Err(PersistenceError::ConcurrentModification {
                    entity_id: staged.order.order_id,
                });
            }
        }

        let MemoryUnitOfWork {
            staged_order,
            staged_audit,
            staged_history,
            ..
        } = *self;
        if let Some(staged) = staged_order {
            state.orders.insert(staged.order.order_id, staged.order);
        }
        state.audit_logs.extend(staged_audit);
        state.history.extend(staged_history);
        Ok(())
    }
}

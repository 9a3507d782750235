//! # State Machine Persistence Layer
//!
//! Storage seams used by the order state-change pipeline.
//!
//! A transition touches three tables and must land in all of them or none.
//! Rather than passing a pool around, the coordinator asks a
//! [`TransitionBackend`] for a [`UnitOfWork`] and performs every read and write
//! through it:
//!
//! - **OrderStore** loads the order and writes the version-guarded update
//! - **ItemCountLookup** answers the execution precondition inside the same view
//! - **AuditSink** and **HistorySink** append the two trail entries
//!
//! `commit` consumes the unit. A unit dropped without `commit` discards its
//! writes, so any early return with `?` rolls back.
//!
//! Implementations live in [`crate::database`]: PostgreSQL transactions and an
//! in-memory backend with fault injection.

use super::errors::PersistenceResult;
use crate::models::{
    NewOrderAuditLog, NewOrderStateHistory, Order, OrderAuditLog, OrderStateHistory,
    OrderStateUpdate,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Order reads and version-guarded writes
#[async_trait]
pub trait OrderStore: Send {
    async fn find_by_id(&mut self, order_id: Uuid) -> PersistenceResult<Option<Order>>;

    /// Apply a state update. Fails with `ConcurrentModification` when the
    /// stored `lock_version` no longer equals `update.expected_version`.
    async fn update(&mut self, update: &OrderStateUpdate) -> PersistenceResult<Order>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditSink: Send {
    async fn append(&mut self, entry: NewOrderAuditLog) -> PersistenceResult<OrderAuditLog>;
}

/// Append-only sub-state history
#[async_trait]
pub trait HistorySink: Send {
    async fn append(&mut self, entry: NewOrderStateHistory)
        -> PersistenceResult<OrderStateHistory>;
}

/// Live item count consumed by the execution precondition
#[async_trait]
pub trait ItemCountLookup: Send {
    async fn count_items(&mut self, order_id: Uuid) -> PersistenceResult<i64>;
}

/// One atomic transition scope
#[async_trait]
pub trait UnitOfWork: OrderStore + AuditSink + HistorySink + ItemCountLookup {
    /// Make every write performed through this unit durable
    async fn commit(self: Box<Self>) -> PersistenceResult<()>;
}

/// Factory for units of work plus the read paths that need no transaction
#[async_trait]
pub trait TransitionBackend: Send + Sync {
    async fn begin(&self) -> PersistenceResult<Box<dyn UnitOfWork>>;

    async fn find_order(&self, order_id: Uuid) -> PersistenceResult<Option<Order>>;

    /// Sub-state history for one order, newest first
    async fn list_history(&self, order_id: Uuid) -> PersistenceResult<Vec<OrderStateHistory>>;
}

#[async_trait]
impl ItemCountLookup for Box<dyn UnitOfWork> {
    async fn count_items(&mut self, order_id: Uuid) -> PersistenceResult<i64> {
        (**self).count_items(order_id).await
    }
}

//! # PostgreSQL Transition Backend
//!
//! Each [`PgUnitOfWork`] wraps one database transaction. Reads inside the unit
//! (the order row and its item count) see the transaction's view; the order
//! update is guarded by `lock_version`, so a writer that lost a race updates
//! zero rows and the unit reports `ConcurrentModification`.
//!
//! Queries are checked at runtime so the crate builds without a database.

use crate::models::{
    NewOrder, NewOrderAuditLog, NewOrderItem, NewOrderStateHistory, Order, OrderAuditLog,
    OrderItem, OrderStateHistory, OrderStateUpdate,
};
use crate::state_machine::errors::{PersistenceError, PersistenceResult};
use crate::state_machine::persistence::{
    AuditSink, HistorySink, ItemCountLookup, OrderStore, TransitionBackend, UnitOfWork,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "order_id, order_number, description, client, state, priority, \
     assigned_to, created_by, started_at, completed_at, estimated_budget, actual_cost, \
     lock_version, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "history_id, order_id, from_sub_state, to_sub_state, actor_id, notes, metadata, created_at";

const AUDIT_COLUMNS: &str = "audit_log_id, entity_type, entity_id, action, actor_id, \
     previous_state, new_state, reason, ip_address, user_agent, created_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: Uuid,
    order_number: String,
    description: String,
    client: String,
    state: String,
    priority: String,
    assigned_to: Option<Uuid>,
    created_by: Uuid,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    estimated_budget: Option<f64>,
    actual_cost: Option<f64>,
    lock_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PersistenceError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse()
            .map_err(|field| PersistenceError::InvalidTransitionData { field })?;
        let priority = row
            .priority
            .parse()
            .map_err(|field| PersistenceError::InvalidTransitionData { field })?;

        Ok(Order {
            order_id: row.order_id,
            order_number: row.order_number,
            description: row.description,
            client: row.client,
            state,
            priority,
            assigned_to: row.assigned_to,
            created_by: row.created_by,
            started_at: row.started_at,
            completed_at: row.completed_at,
            estimated_budget: row.estimated_budget,
            actual_cost: row.actual_cost,
            lock_version: row.lock_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    history_id: Uuid,
    order_id: Uuid,
    from_sub_state: String,
    to_sub_state: String,
    actor_id: Uuid,
    notes: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for OrderStateHistory {
    type Error = PersistenceError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(OrderStateHistory {
            history_id: row.history_id,
            order_id: row.order_id,
            from_sub_state: row
                .from_sub_state
                .parse()
                .map_err(|field| PersistenceError::InvalidTransitionData { field })?,
            to_sub_state: row
                .to_sub_state
                .parse()
                .map_err(|field| PersistenceError::InvalidTransitionData { field })?,
            actor_id: row.actor_id,
            notes: row.notes,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    audit_log_id: Uuid,
    entity_type: String,
    entity_id: Uuid,
    action: String,
    actor_id: Uuid,
    previous_state: serde_json::Value,
    new_state: serde_json::Value,
    reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for OrderAuditLog {
    fn from(row: AuditRow) -> Self {
        OrderAuditLog {
            audit_log_id: row.audit_log_id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            actor_id: row.actor_id,
            previous_state: row.previous_state,
            new_state: row.new_state,
            reason: row.reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Transition backend over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgTransitionBackend {
    pool: PgPool,
}

impl PgTransitionBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create an order in `pending` with version 0
    pub async fn insert_order(&self, new_order: NewOrder) -> PersistenceResult<Order> {
        let sql = format!(
            "INSERT INTO orders (order_id, order_number, description, client, state, priority, \
             assigned_to, created_by, estimated_budget) \
             VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_order.order_number)
            .bind(&new_order.description)
            .bind(&new_order.client)
            .bind(new_order.priority.as_str())
            .bind(new_order.assigned_to)
            .bind(new_order.created_by)
            .bind(new_order.estimated_budget)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    pub async fn insert_item(&self, new_item: NewOrderItem) -> PersistenceResult<OrderItem> {
        let (item_id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO order_items (item_id, order_id, description, quantity) \
             VALUES ($1, $2, $3, $4) RETURNING item_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new_item.order_id)
        .bind(&new_item.description)
        .bind(new_item.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderItem {
            item_id,
            order_id: new_item.order_id,
            description: new_item.description,
            quantity: new_item.quantity,
            created_at,
        })
    }

    /// Audit entries for one order, oldest first
    pub async fn list_audit_logs(&self, order_id: Uuid) -> PersistenceResult<Vec<OrderAuditLog>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM order_audit_logs \
             WHERE entity_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(OrderAuditLog::from).collect())
    }
}

#[async_trait]
impl TransitionBackend for PgTransitionBackend {
    async fn begin(&self) -> PersistenceResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }

    async fn find_order(&self, order_id: Uuid) -> PersistenceResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn list_history(&self, order_id: Uuid) -> PersistenceResult<Vec<OrderStateHistory>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM order_state_history \
             WHERE order_id = $1 ORDER BY created_at DESC, history_id DESC"
        );
        sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(OrderStateHistory::try_from)
            .collect()
    }
}

/// One transition's database transaction. Dropping it without `commit`
/// rolls the transaction back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> PersistenceResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(PersistenceError::UnitClosed)
    }
}

#[async_trait]
impl OrderStore for PgUnitOfWork {
    async fn find_by_id(&mut self, order_id: Uuid) -> PersistenceResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        let tx = self.tx()?;
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn update(&mut self, update: &OrderStateUpdate) -> PersistenceResult<Order> {
        let sql = format!(
            "UPDATE orders \
             SET state = $3, started_at = $4, completed_at = $5, updated_at = $6, \
                 lock_version = lock_version + 1 \
             WHERE order_id = $1 AND lock_version = $2 \
             RETURNING {ORDER_COLUMNS}"
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(update.order_id)
            .bind(update.expected_version)
            .bind(update.state.as_str())
            .bind(update.started_at)
            .bind(update.completed_at)
            .bind(update.updated_at)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(PersistenceError::ConcurrentModification {
                entity_id: update.order_id,
            }),
        }
    }
}

#[async_trait]
impl ItemCountLookup for PgUnitOfWork {
    async fn count_items(&mut self, order_id: Uuid) -> PersistenceResult<i64> {
        let tx = self.tx()?;
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl AuditSink for PgUnitOfWork {
    async fn append(&mut self, entry: NewOrderAuditLog) -> PersistenceResult<OrderAuditLog> {
        let sql = format!(
            "INSERT INTO order_audit_logs \
             (audit_log_id, entity_type, entity_id, action, actor_id, previous_state, \
              new_state, reason, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {AUDIT_COLUMNS}"
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(&entry.action)
            .bind(entry.actor_id)
            .bind(&entry.previous_state)
            .bind(&entry.new_state)
            .bind(&entry.reason)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.created_at)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl HistorySink for PgUnitOfWork {
    async fn append(
        &mut self,
        entry: NewOrderStateHistory,
    ) -> PersistenceResult<OrderStateHistory> {
        let sql = format!(
            "INSERT INTO order_state_history \
             (history_id, order_id, from_sub_state, to_sub_state, actor_id, notes, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {HISTORY_COLUMNS}"
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.order_id)
            .bind(entry.from_sub_state.as_str())
            .bind(entry.to_sub_state.as_str())
            .bind(entry.actor_id)
            .bind(&entry.notes)
            .bind(&entry.metadata)
            .bind(entry.created_at)
            .fetch_one(&mut **tx)
            .await?;
        row.try_into()
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> PersistenceResult<()> {
        let PgUnitOfWork { tx } = *self;
        tx.ok_or(PersistenceError::UnitClosed)?.commit().await?;
        Ok(())
    }
}

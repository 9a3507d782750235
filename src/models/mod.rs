//! # Data Models
//!
//! Plain data types for orders and their append-only trails. Storage lives in
//! [`crate::database`]; these types carry no query logic of their own.

pub mod order;
pub mod order_audit_log;
pub mod order_item;
pub mod order_state_history;

pub use order::{NewOrder, Order, OrderPriority, OrderSnapshot, OrderStateUpdate};
pub use order_audit_log::{NewOrderAuditLog, OrderAuditLog};
pub use order_item::{NewOrderItem, OrderItem};
pub use order_state_history::{NewOrderStateHistory, OrderStateHistory};

#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Work Order Core
//!
//! Lifecycle state machine and transactional state-change pipeline for work
//! orders.
//!
//! ## Overview
//!
//! Orders move through six primary states (`pending`, `planning`,
//! `execution`, `paused`, `completed`, `cancelled`). A requested transition is
//! checked against the cancellation window, the declared transition graph and
//! the execution preconditions. When it passes, the order update, one audit
//! entry and one sub-state history entry are written as a single unit of work,
//! and an `order.state_changed` event is published after the commit.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - States, transition graph, guards, sub-state mapping and the coordinator
//! - [`models`] - Orders, items, audit entries and history entries
//! - [`database`] - PostgreSQL and in-memory transition backends
//! - [`events`] - Post-commit event publishing
//! - [`config`] - Layered configuration
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use uuid::Uuid;
//! use workorder_core::database::InMemoryBackend;
//! use workorder_core::events::EventPublisher;
//! use workorder_core::models::{NewOrder, OrderPriority};
//! use workorder_core::state_machine::{ChangeStateRequest, OrderState, OrderStateCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = InMemoryBackend::new();
//! let order = backend.insert_order(NewOrder {
//!     order_number: "WO-1001".to_string(),
//!     description: "Replace lobby lighting".to_string(),
//!     client: "Initech".to_string(),
//!     priority: OrderPriority::Medium,
//!     assigned_to: None,
//!     created_by: Uuid::new_v4(),
//!     estimated_budget: None,
//! });
//!
//! let coordinator = OrderStateCoordinator::new(
//!     Arc::new(backend.clone()),
//!     Arc::new(EventPublisher::default()),
//! );
//! let snapshot = coordinator
//!     .change_state(order.order_id, ChangeStateRequest::new(OrderState::Planning, Uuid::new_v4()))
//!     .await?;
//! assert_eq!(snapshot.state, OrderState::Planning);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod state_machine;

pub use config::{ConfigLoader, WorkOrderConfig};
pub use error::{WorkOrderError, WorkOrderResult};
pub use events::{EventBus, EventPublisher, OrderStateChanged};
pub use models::{Order, OrderSnapshot};
pub use state_machine::{
    ChangeStateRequest, OrderState, OrderStateCoordinator, OrderSubState, StateInfo,
    StateMachineError, TransitionContext,
};

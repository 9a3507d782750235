//! # Lifecycle Events
//!
//! Best-effort, post-commit notifications for downstream listeners. Nothing
//! here participates in the transition's unit of work.

pub mod publisher;
pub mod types;

pub use publisher::{EventBus, EventPublisher, PublishError, PublishedEvent};
pub use types::OrderStateChanged;

//! # Database Layer
//!
//! Connection pooling and the two [`TransitionBackend`] implementations:
//!
//! - [`postgres`] - sqlx transactions over the tables in `migrations/`
//! - [`memory`] - process-local storage with fault injection, for tests
//!
//! ```rust,no_run
//! use workorder_core::config::DatabaseConfig;
//! use workorder_core::database::{create_pool, PgTransitionBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! let backend = PgTransitionBackend::new(pool);
//! # Ok(())
//! # }
//! ```
//!
//! [`TransitionBackend`]: crate::state_machine::TransitionBackend

pub mod connection;
pub mod memory;
pub mod postgres;

pub use connection::create_pool;
pub use memory::{FaultPoint, InMemoryBackend, MemoryUnitOfWork};
pub use postgres::{PgTransitionBackend, PgUnitOfWork};

// State machine module for the work order lifecycle
//
// The graph, the precondition guards and the sub-state mapper are pure or
// read-only; the coordinator ties them to a unit of work and the event bus.

pub mod context;
pub mod errors;
pub mod guards;
pub mod order_state_machine;
pub mod persistence;
pub mod states;
pub mod sub_states;
pub mod transitions;

// Re-export main types for convenient access
pub use context::TransitionContext;
pub use errors::{
    DenialCode, GuardError, PersistenceError, StateMachineError, StateMachineResult,
};
pub use order_state_machine::{ChangeStateRequest, OrderStateCoordinator, StateInfo};
pub use states::OrderState;
pub use sub_states::{OrderSubState, SubStateMapper};
pub use transitions::{Denial, TransitionGraph, TransitionVerdict};

// Common traits and utilities
pub use guards::{PreconditionEvaluator, PreconditionGuard};
pub use persistence::{
    AuditSink, HistorySink, ItemCountLookup, OrderStore, TransitionBackend, UnitOfWork,
};

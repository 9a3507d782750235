//! # Transition Graph
//!
//! Pure validation of requested primary-state changes. The graph is declared
//! explicitly; any pair it does not list is denied, and unrecognized state
//! values fail closed.

use super::errors::{validation_denied, DenialCode, StateMachineResult};
use super::states::OrderState;
use serde::{Deserialize, Serialize};

/// Why a transition was refused by the graph validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub code: DenialCode,
    pub message: String,
}

/// Outcome of a graph validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TransitionVerdict {
    Allowed,
    Denied(Denial),
}

impl TransitionVerdict {
    fn denied(code: DenialCode, message: impl Into<String>) -> Self {
        Self::Denied(Denial {
            code,
            message: message.into(),
        })
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Allowed => None,
            Self::Denied(denial) => Some(denial),
        }
    }

    /// Convert a denial into a validation error
    pub fn into_result(self) -> StateMachineResult<()> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(Denial { code, message }) => Err(validation_denied(code, message)),
        }
    }
}

/// Declared lifecycle graph for work orders
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionGraph;

impl TransitionGraph {
    /// Successors of `from` in the declared graph
    pub fn allowed_targets(from: OrderState) -> &'static [OrderState] {
        use OrderState::*;

        match from {
            Pending => &[Planning, Cancelled],
            Planning => &[Pending, Execution, Paused, Cancelled],
            Execution => &[Planning, Paused, Completed],
            Paused => &[Planning, Execution],
            Completed | Cancelled => &[],
        }
    }

    pub fn is_declared(from: OrderState, to: OrderState) -> bool {
        Self::allowed_targets(from).contains(&to)
    }

    /// A state with no outgoing edges
    pub fn is_final(state: OrderState) -> bool {
        Self::allowed_targets(state).is_empty()
    }

    /// Validate a requested transition
    pub fn validate(
        current: OrderState,
        requested: OrderState,
        reason_provided: bool,
    ) -> TransitionVerdict {
        if current == requested {
            return TransitionVerdict::denied(
                DenialCode::SelfTransition,
                format!("order is already {current}"),
            );
        }

        if requested.requires_reason() && !reason_provided {
            return TransitionVerdict::denied(
                DenialCode::ReasonRequired,
                format!("a reason is required to move an order to {requested}"),
            );
        }

        if !Self::is_declared(current, requested) {
            let allowed = Self::allowed_targets(current);
            let message = if allowed.is_empty() {
                format!("{current} is a final state; no transitions are allowed")
            } else {
                let names: Vec<&str> = allowed.iter().map(OrderState::as_str).collect();
                format!(
                    "transition from {current} to {requested} is not allowed (allowed: {})",
                    names.join(", ")
                )
            };
            return TransitionVerdict::denied(DenialCode::TransitionNotAllowed, message);
        }

        TransitionVerdict::Allowed
    }

    /// Validate unparsed state names; unrecognized values are denied
    pub fn validate_raw(current: &str, requested: &str, reason_provided: bool) -> TransitionVerdict {
        let current = match current.parse::<OrderState>() {
            Ok(state) => state,
            Err(e) => return TransitionVerdict::denied(DenialCode::UnknownState, e),
        };
        let requested = match requested.parse::<OrderState>() {
            Ok(state) => state,
            Err(e) => return TransitionVerdict::denied(DenialCode::UnknownState, e),
        };
        Self::validate(current, requested, reason_provided)
    }
}

/// A reason counts as provided only when it has visible content
pub fn reason_is_present(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| !r.trim().is_empty())
}

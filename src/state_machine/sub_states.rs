//! # Sub-state Vocabulary and Mapping
//!
//! Orders carry a coarse [`OrderState`] and a separate, richer history
//! vocabulary ([`OrderSubState`]). Every primary-state transition records one
//! history entry whose labels come from the [`SubStateMapper`].
//!
//! The mapping is many-to-one and not invertible, so the two dimensions stay
//! separate types. The table is data, not code: the default can be overridden
//! from configuration (see [`crate::config::LifecycleConfig`]).

use super::errors::{StateMachineError, StateMachineResult};
use super::states::OrderState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fine-grained lifecycle milestone recorded in the state history trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSubState {
    RequestReceived,
    VisitScheduled,
    ProposalDrafted,
    ProposalApproved,
    PlanningStarted,
    PlanningApproved,
    ExecutionStarted,
    ExecutionCompleted,
    ReportGenerated,
    HandoverDrafted,
    HandoverSigned,
    ServiceEntryApproved,
    InvoiceApproved,
    PaymentReceived,
}

impl OrderSubState {
    /// Full vocabulary in workflow order
    pub const ALL: [OrderSubState; 14] = [
        Self::RequestReceived,
        Self::VisitScheduled,
        Self::ProposalDrafted,
        Self::ProposalApproved,
        Self::PlanningStarted,
        Self::PlanningApproved,
        Self::ExecutionStarted,
        Self::ExecutionCompleted,
        Self::ReportGenerated,
        Self::HandoverDrafted,
        Self::HandoverSigned,
        Self::ServiceEntryApproved,
        Self::InvoiceApproved,
        Self::PaymentReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::VisitScheduled => "visit_scheduled",
            Self::ProposalDrafted => "proposal_drafted",
            Self::ProposalApproved => "proposal_approved",
            Self::PlanningStarted => "planning_started",
            Self::PlanningApproved => "planning_approved",
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ReportGenerated => "report_generated",
            Self::HandoverDrafted => "handover_drafted",
            Self::HandoverSigned => "handover_signed",
            Self::ServiceEntryApproved => "service_entry_approved",
            Self::InvoiceApproved => "invoice_approved",
            Self::PaymentReceived => "payment_received",
        }
    }

    /// 1-based position of this milestone in the workflow
    pub fn step_number(&self) -> u8 {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }
}

impl fmt::Display for OrderSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderSubState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|label| label.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid order sub-state: {s}"))
    }
}

/// Deterministic primary-state to sub-state lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubStateMapper {
    table: HashMap<OrderState, OrderSubState>,
}

impl SubStateMapper {
    /// Build a mapper from an explicit table. States absent from the table
    /// fail at lookup time rather than falling back to a default.
    pub fn new(table: HashMap<OrderState, OrderSubState>) -> Self {
        Self { table }
    }

    /// Build a mapper from string pairs, as read from configuration
    pub fn from_labels<'a, I>(pairs: I) -> StateMachineResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = HashMap::new();
        for (primary, label) in pairs {
            let state = primary.parse::<OrderState>().map_err(|e| {
                StateMachineError::Mapping {
                    state: primary.to_string(),
                    reason: e,
                }
            })?;
            let sub_state = label.parse::<OrderSubState>().map_err(|e| {
                StateMachineError::Mapping {
                    state: primary.to_string(),
                    reason: e,
                }
            })?;
            table.insert(state, sub_state);
        }
        Ok(Self { table })
    }

    /// Translate a primary state into its representative history label
    pub fn map_to_sub_state(&self, state: OrderState) -> StateMachineResult<OrderSubState> {
        self.table
            .get(&state)
            .copied()
            .ok_or_else(|| StateMachineError::Mapping {
                state: state.to_string(),
                reason: "no sub-state configured for primary state".to_string(),
            })
    }

    /// Override a single entry
    pub fn with_entry(mut self, state: OrderState, sub_state: OrderSubState) -> Self {
        self.table.insert(state, sub_state);
        self
    }

    /// Remove a single entry
    pub fn without_entry(mut self, state: OrderState) -> Self {
        self.table.remove(&state);
        self
    }

    /// Layer `overrides` on top of this table
    pub fn merged_with(mut self, overrides: SubStateMapper) -> Self {
        self.table.extend(overrides.table);
        self
    }

    pub fn is_complete(&self) -> bool {
        OrderState::ALL.iter().all(|s| self.table.contains_key(s))
    }
}

impl Default for SubStateMapper {
    fn default() -> Self {
        use OrderState::*;
        use OrderSubState::*;

        // cancelled shares the intake label; override via lifecycle.sub_state_mapping
        let table = HashMap::from([
            (Pending, RequestReceived),
            (Planning, PlanningStarted),
            (Execution, ExecutionStarted),
            (Paused, ExecutionStarted),
            (Completed, PaymentReceived),
            (Cancelled, RequestReceived),
        ]);
        Self { table }
    }
}

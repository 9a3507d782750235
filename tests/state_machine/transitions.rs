//! Property tests for the transition graph.

use crate::common::strategies::*;
use proptest::prelude::*;
use workorder_core::state_machine::{DenialCode, OrderState, TransitionGraph, TransitionVerdict};

fn denial_code(verdict: &TransitionVerdict) -> Option<DenialCode> {
    verdict.denial().map(|d| d.code)
}

proptest! {
    /// Property: every declared pair is allowed once a reason is supplied
    #[test]
    fn declared_pairs_are_allowed((from, to) in distinct_state_pair_strategy()) {
        prop_assume!(TransitionGraph::is_declared(from, to));
        prop_assert!(TransitionGraph::validate(from, to, true).is_allowed());
        if !to.requires_reason() {
            prop_assert!(TransitionGraph::validate(from, to, false).is_allowed());
        }
    }

    /// Property: every undeclared pair is denied, whatever the reason
    #[test]
    fn undeclared_pairs_are_denied(
        (from, to) in distinct_state_pair_strategy(),
        reason_provided in any::<bool>(),
    ) {
        prop_assume!(!TransitionGraph::is_declared(from, to));
        let verdict = TransitionGraph::validate(from, to, reason_provided);
        prop_assert!(!verdict.is_allowed());
    }

    /// Property: closing states without a reason are denied for reason_required
    #[test]
    fn closing_without_reason_is_denied(from in order_state_strategy()) {
        for to in [OrderState::Completed, OrderState::Cancelled] {
            if from == to {
                continue;
            }
            let verdict = TransitionGraph::validate(from, to, false);
            prop_assert_eq!(denial_code(&verdict), Some(DenialCode::ReasonRequired));
        }
    }

    /// Property: self transitions are always denied
    #[test]
    fn self_transitions_are_denied(state in order_state_strategy(), reason in any::<bool>()) {
        let verdict = TransitionGraph::validate(state, state, reason);
        prop_assert_eq!(denial_code(&verdict), Some(DenialCode::SelfTransition));
    }

    /// Property: unknown state names fail closed
    #[test]
    fn unknown_states_fail_closed(
        unknown in unknown_state_strategy(),
        known in order_state_strategy(),
    ) {
        let verdict = TransitionGraph::validate_raw(&unknown, known.as_str(), true);
        prop_assert_eq!(denial_code(&verdict), Some(DenialCode::UnknownState));
        let verdict = TransitionGraph::validate_raw(known.as_str(), &unknown, true);
        prop_assert_eq!(denial_code(&verdict), Some(DenialCode::UnknownState));
    }

    /// Property: blank reasons never count as provided
    #[test]
    fn blank_reasons_are_absent(reason in blank_reason_strategy()) {
        prop_assert!(!workorder_core::state_machine::transitions::reason_is_present(Some(&reason)));
    }

    /// Property: visible reasons always count as provided
    #[test]
    fn visible_reasons_are_present(reason in reason_strategy()) {
        prop_assert!(workorder_core::state_machine::transitions::reason_is_present(Some(&reason)));
    }
}

#[test]
fn test_terminal_states_have_no_successors() {
    for state in OrderState::ALL {
        assert_eq!(TransitionGraph::is_final(state), state.is_terminal());
    }
    assert!(TransitionGraph::is_final(OrderState::Completed));
    assert!(TransitionGraph::is_final(OrderState::Cancelled));
}

#[test]
fn test_completed_to_cancelled_denied_by_graph() {
    let verdict = TransitionGraph::validate(OrderState::Completed, OrderState::Cancelled, true);
    assert_eq!(denial_code(&verdict), Some(DenialCode::TransitionNotAllowed));
    assert!(verdict.into_result().is_err());
}

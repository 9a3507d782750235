//! State-change coordinator tests against the in-memory backend.

use crate::common::{OrderBuilder, RejectingEventBus, TestHarness};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;
use workorder_core::config::LifecycleConfig;
use workorder_core::database::FaultPoint;
use workorder_core::state_machine::{
    ChangeStateRequest, DenialCode, OrderState, OrderStateCoordinator, OrderSubState,
    StateMachineError, SubStateMapper, TransitionContext,
};

fn request(to: OrderState) -> ChangeStateRequest {
    ChangeStateRequest::new(to, Uuid::new_v4())
}

fn assert_denied(err: &StateMachineError, expected: DenialCode) {
    assert_eq!(
        err.denial_code(),
        Some(expected),
        "expected {expected} denial, got {err:?}"
    );
}

#[tokio::test]
async fn test_successful_transition_writes_one_audit_and_one_history_entry() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());
    let actor = Uuid::new_v4();

    let snapshot = harness
        .coordinator
        .change_state(
            order.order_id,
            ChangeStateRequest::new(OrderState::Planning, actor),
        )
        .await
        .unwrap();

    assert_eq!(snapshot.state, OrderState::Planning);
    assert_eq!(snapshot.sub_state, OrderSubState::PlanningStarted);
    assert_eq!(snapshot.step_number, 5);
    assert_eq!(snapshot.lock_version, 1);

    let stored = harness.stored(order.order_id);
    assert_eq!(stored.state, OrderState::Planning);
    assert_eq!(harness.backend.audit_count(), 1);
    assert_eq!(harness.backend.history_count(), 1);

    let audit = &harness.backend.audit_logs(order.order_id)[0];
    assert_eq!(audit.entity_type, "order");
    assert_eq!(audit.action, "order.state_changed");
    assert_eq!(audit.actor_id, actor);
    assert_eq!(audit.previous_state["state"], "pending");
    assert_eq!(audit.new_state["state"], "planning");
    assert_eq!(audit.new_state["lock_version"], 1);

    let history = harness.coordinator.state_history(order.order_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_sub_state, OrderSubState::RequestReceived);
    assert_eq!(history[0].to_sub_state, OrderSubState::PlanningStarted);
    assert_eq!(history[0].actor_id, actor);
}

#[tokio::test]
async fn test_full_lifecycle_sets_start_and_end() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::ready_for_execution());
    let id = order.order_id;

    harness
        .coordinator
        .change_state(id, request(OrderState::Planning))
        .await
        .unwrap();

    let executing = harness
        .coordinator
        .change_state(id, request(OrderState::Execution))
        .await
        .unwrap();
    let started_at = executing.started_at.expect("execution should set the start");
    assert!(executing.completed_at.is_none());

    let completed = harness
        .coordinator
        .change_state(
            id,
            request(OrderState::Completed).with_reason("Client signed the handover"),
        )
        .await
        .unwrap();
    assert_eq!(completed.started_at, Some(started_at));
    assert!(completed.completed_at.unwrap() >= started_at);
    assert_eq!(completed.lock_version, 3);

    let history = harness.coordinator.state_history(id).await.unwrap();
    let labels: Vec<(OrderSubState, OrderSubState)> = history
        .iter()
        .map(|h| (h.from_sub_state, h.to_sub_state))
        .collect();
    assert_eq!(
        labels,
        vec![
            (OrderSubState::ExecutionStarted, OrderSubState::PaymentReceived),
            (OrderSubState::PlanningStarted, OrderSubState::ExecutionStarted),
            (OrderSubState::RequestReceived, OrderSubState::PlanningStarted),
        ]
    );
    assert_eq!(harness.backend.audit_count(), 3);

    let info = harness.coordinator.state_info(id).await.unwrap();
    assert!(info.is_final);
    assert!(info.allowed_next_states.is_empty());
}

#[tokio::test]
async fn test_resume_from_pause_keeps_original_start() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::ready_for_execution().in_state(OrderState::Planning));
    let id = order.order_id;

    let first = harness
        .coordinator
        .change_state(id, request(OrderState::Execution))
        .await
        .unwrap();
    let paused = harness
        .coordinator
        .change_state(id, request(OrderState::Paused))
        .await
        .unwrap();
    assert_eq!(paused.sub_state, OrderSubState::ExecutionStarted);

    let resumed = harness
        .coordinator
        .change_state(id, request(OrderState::Execution))
        .await
        .unwrap();
    assert_eq!(resumed.started_at, first.started_at);
}

#[tokio::test]
async fn test_pending_to_execution_is_not_in_graph() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());

    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Execution))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::TransitionNotAllowed);
    assert_eq!(harness.stored(order.order_id).state, OrderState::Pending);

    // Still denied by the graph even when the order is otherwise ready
    let ready = harness.order(OrderBuilder::ready_for_execution());
    let err = harness
        .coordinator
        .change_state(ready.order_id, request(OrderState::Execution))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::TransitionNotAllowed);
}

#[tokio::test]
async fn test_execution_requires_assigned_actor() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new().with_items(2).in_state(OrderState::Planning));

    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Execution))
        .await
        .unwrap_err();
    assert!(matches!(err, StateMachineError::Precondition { .. }), "{err:?}");
    assert_eq!(err.kind(), "precondition_error");
    assert_eq!(harness.backend.audit_count(), 0);
}

#[tokio::test]
async fn test_execution_requires_items() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new().assigned().in_state(OrderState::Planning));

    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Execution))
        .await
        .unwrap_err();
    assert!(matches!(err, StateMachineError::Precondition { .. }), "{err:?}");

    // The count is read live, so adding an item unblocks the transition
    harness.backend.insert_item(workorder_core::models::NewOrderItem {
        order_id: order.order_id,
        description: "Compressor".to_string(),
        quantity: 1,
    });
    assert!(harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Execution))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cancellation_window_runs_before_graph() {
    let harness = TestHarness::new();

    for state in [OrderState::Execution, OrderState::Paused, OrderState::Completed] {
        let order = harness.order(OrderBuilder::ready_for_execution().in_state(state));
        let err = harness
            .coordinator
            .change_state(
                order.order_id,
                request(OrderState::Cancelled).with_reason("Client withdrew"),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, StateMachineError::Precondition { .. }),
            "cancelling from {state} should be a precondition failure, got {err:?}"
        );
    }
    assert_eq!(harness.backend.audit_count(), 0);
}

#[tokio::test]
async fn test_cancellation_within_window() {
    let harness = TestHarness::new();

    for state in [OrderState::Pending, OrderState::Planning] {
        let order = harness.order(OrderBuilder::new().in_state(state));
        let snapshot = harness
            .coordinator
            .change_state(
                order.order_id,
                request(OrderState::Cancelled).with_reason("Duplicate request"),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.state, OrderState::Cancelled);
        assert_eq!(snapshot.sub_state, OrderSubState::RequestReceived);
    }
}

#[tokio::test]
async fn test_reason_required_for_closing_states() {
    let harness = TestHarness::new();
    let pending = harness.order(OrderBuilder::new());
    let executing = harness.order(OrderBuilder::ready_for_execution().in_state(OrderState::Execution));

    let err = harness
        .coordinator
        .change_state(pending.order_id, request(OrderState::Cancelled))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::ReasonRequired);

    let err = harness
        .coordinator
        .change_state(
            pending.order_id,
            request(OrderState::Cancelled).with_reason("   \t"),
        )
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::ReasonRequired);

    let err = harness
        .coordinator
        .change_state(executing.order_id, request(OrderState::Completed))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::ReasonRequired);
}

#[tokio::test]
async fn test_self_transition_is_denied() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new().in_state(OrderState::Planning));

    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::SelfTransition);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let harness = TestHarness::new();
    let missing = Uuid::new_v4();

    let err = harness
        .coordinator
        .change_state(missing, request(OrderState::Planning))
        .await
        .unwrap_err();
    assert!(matches!(err, StateMachineError::NotFound { order_id } if order_id == missing));

    assert!(matches!(
        harness.coordinator.state_info(missing).await,
        Err(StateMachineError::NotFound { .. })
    ));
    assert!(matches!(
        harness.coordinator.state_history(missing).await,
        Err(StateMachineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_note_length_limit() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());

    let err = harness
        .coordinator
        .change_state(
            order.order_id,
            request(OrderState::Planning).with_notes("x".repeat(501)),
        )
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::NoteTooLong);

    let err = harness
        .coordinator
        .change_state(
            order.order_id,
            request(OrderState::Cancelled).with_reason("é".repeat(501)),
        )
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::NoteTooLong);

    let snapshot = harness
        .coordinator
        .change_state(
            order.order_id,
            request(OrderState::Planning).with_notes("x".repeat(500)),
        )
        .await
        .unwrap();
    assert_eq!(snapshot.state, OrderState::Planning);
}

#[tokio::test]
async fn test_failure_after_order_write_rolls_back_everything() {
    for point in [
        FaultPoint::OrderUpdate,
        FaultPoint::AuditAppend,
        FaultPoint::HistoryAppend,
        FaultPoint::Commit,
    ] {
        let harness = TestHarness::new();
        let order = harness.order(OrderBuilder::new());
        let mut events = harness.publisher.subscribe();

        harness.backend.inject_fault(point);
        let err = harness
            .coordinator
            .change_state(order.order_id, request(OrderState::Planning))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "persistence_error", "fault at {point:?}");

        let stored = harness.stored(order.order_id);
        assert_eq!(stored, order, "order changed after fault at {point:?}");
        assert_eq!(harness.backend.audit_count(), 0);
        assert_eq!(harness.backend.history_count(), 0);
        assert!(events.try_recv().is_err(), "event published after fault at {point:?}");
    }
}

#[tokio::test]
async fn test_missing_sub_state_mapping_aborts_the_unit() {
    let harness = TestHarness::new();
    let coordinator = harness
        .coordinator
        .clone()
        .with_mapper(SubStateMapper::default().without_entry(OrderState::Planning));
    let order = harness.order(OrderBuilder::new());

    let err = coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap_err();
    assert!(matches!(err, StateMachineError::Mapping { .. }), "{err:?}");
    assert_eq!(harness.stored(order.order_id).lock_version, 0);
    assert_eq!(harness.backend.audit_count(), 0);
    assert_eq!(harness.backend.history_count(), 0);
}

#[tokio::test]
async fn test_stale_version_is_a_conflict() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());

    harness.backend.simulate_concurrent_writer();
    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap_err();

    assert!(matches!(err, StateMachineError::Conflict { order_id } if order_id == order.order_id));
    assert!(err.is_retryable());
    assert_eq!(harness.stored(order.order_id).state, OrderState::Pending);
    assert_eq!(harness.backend.audit_count(), 0);

    // A reload-and-retry succeeds against the new version
    let snapshot = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap();
    assert_eq!(snapshot.lock_version, 2);
}

#[tokio::test]
async fn test_event_published_after_commit() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());
    let mut events = harness.publisher.subscribe();
    let actor = Uuid::new_v4();
    let correlation_id = Uuid::new_v4();

    harness
        .coordinator
        .change_state(
            order.order_id,
            ChangeStateRequest::new(OrderState::Cancelled, actor)
                .with_reason("Budget withdrawn")
                .with_context(TransitionContext::with_correlation_id(correlation_id)),
        )
        .await
        .unwrap();

    let published = events.try_recv().unwrap();
    assert_eq!(published.name, "order.state_changed");
    let event = published.event;
    assert_eq!(event.order_id, order.order_id);
    assert_eq!(event.order_number, order.order_number);
    assert_eq!(event.from_state, OrderState::Pending);
    assert_eq!(event.to_state, OrderState::Cancelled);
    assert_eq!(event.reason.as_deref(), Some("Budget withdrawn"));
    assert_eq!(event.actor_id, actor);
    assert_eq!(event.correlation_id, correlation_id);

    // Rejected requests publish nothing
    let _ = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap_err();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_publish_failure_does_not_roll_back() {
    let harness = TestHarness::new();
    let bus = Arc::new(RejectingEventBus::default());
    let coordinator = OrderStateCoordinator::new(Arc::new(harness.backend.clone()), bus.clone());
    let order = harness.order(OrderBuilder::new());

    let snapshot = coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap();

    assert_eq!(snapshot.state, OrderState::Planning);
    assert_eq!(bus.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(harness.stored(order.order_id).state, OrderState::Planning);
    assert_eq!(harness.backend.audit_count(), 1);
}

#[tokio::test]
async fn test_context_flows_into_audit_and_history() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());
    let correlation_id = Uuid::new_v4();
    let context = TransitionContext::with_correlation_id(correlation_id)
        .with_client("192.168.10.4", "field-tablet/4.1");

    harness
        .coordinator
        .change_state(
            order.order_id,
            request(OrderState::Planning)
                .with_notes("Site visit booked for Monday")
                .with_metadata(serde_json::json!({"visit_slot": "am"}))
                .with_context(context),
        )
        .await
        .unwrap();

    let audit = &harness.backend.audit_logs(order.order_id)[0];
    assert_eq!(audit.ip_address.as_deref(), Some("192.168.10.4"));
    assert_eq!(audit.user_agent.as_deref(), Some("field-tablet/4.1"));
    assert!(audit.reason.is_none());

    let history = &harness.coordinator.state_history(order.order_id).await.unwrap()[0];
    assert_eq!(history.notes.as_deref(), Some("Site visit booked for Monday"));
    let metadata = history.metadata.as_ref().unwrap();
    assert_eq!(metadata["visit_slot"], "am");
    assert_eq!(metadata["from_state"], "pending");
    assert_eq!(metadata["to_state"], "planning");
    assert_eq!(metadata["correlation_id"], correlation_id.to_string());
}

#[tokio::test]
async fn test_generated_correlation_id_reaches_history_and_event() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());
    let mut events = harness.publisher.subscribe();

    harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning))
        .await
        .unwrap();

    let event = events.try_recv().unwrap().event;
    let history = &harness.coordinator.state_history(order.order_id).await.unwrap()[0];
    let metadata = history.metadata.as_ref().unwrap();
    assert_eq!(metadata["correlation_id"], event.correlation_id.to_string());
}

#[tokio::test]
async fn test_whitespace_reason_is_missing_and_history_note_is_empty() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());

    let err = harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Cancelled).with_reason(" \t\n "))
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::ReasonRequired);

    harness
        .coordinator
        .change_state(order.order_id, request(OrderState::Planning).with_reason("   "))
        .await
        .unwrap();
    let history = &harness.coordinator.state_history(order.order_id).await.unwrap()[0];
    assert!(history.notes.is_none());
    assert!(harness.backend.audit_logs(order.order_id)[0].reason.is_none());
}

#[tokio::test]
async fn test_reason_becomes_history_note_when_notes_absent() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new());

    harness
        .coordinator
        .change_state(
            order.order_id,
            request(OrderState::Cancelled).with_reason("  Customer moved sites  "),
        )
        .await
        .unwrap();

    let history = &harness.coordinator.state_history(order.order_id).await.unwrap()[0];
    assert_eq!(history.notes.as_deref(), Some("Customer moved sites"));
    let audit = &harness.backend.audit_logs(order.order_id)[0];
    assert_eq!(audit.reason.as_deref(), Some("Customer moved sites"));
}

#[tokio::test]
async fn test_state_info_lists_next_states() {
    let harness = TestHarness::new();
    let order = harness.order(OrderBuilder::new().in_state(OrderState::Planning));

    let info = harness.coordinator.state_info(order.order_id).await.unwrap();
    assert_eq!(info.state, OrderState::Planning);
    assert_eq!(info.sub_state, OrderSubState::PlanningStarted);
    assert_eq!(info.step_number, 5);
    assert!(!info.is_final);
    assert_eq!(
        info.allowed_next_states,
        vec![
            OrderState::Pending,
            OrderState::Execution,
            OrderState::Paused,
            OrderState::Cancelled
        ]
    );
}

#[tokio::test]
async fn test_configured_mapping_overrides_default() {
    let harness = TestHarness::new();
    let mut config = LifecycleConfig::default();
    config
        .sub_state_mapping
        .insert("cancelled".to_string(), "service_entry_approved".to_string());
    config.max_note_length = 10;

    let coordinator = OrderStateCoordinator::from_config(
        Arc::new(harness.backend.clone()),
        Arc::new(harness.publisher.clone()),
        &config,
    )
    .unwrap();
    let order = harness.order(OrderBuilder::new());

    let err = coordinator
        .change_state(
            order.order_id,
            request(OrderState::Cancelled).with_reason("Far too long a reason"),
        )
        .await
        .unwrap_err();
    assert_denied(&err, DenialCode::NoteTooLong);

    let snapshot = coordinator
        .change_state(order.order_id, request(OrderState::Cancelled).with_reason("Dup"))
        .await
        .unwrap();
    assert_eq!(snapshot.sub_state, OrderSubState::ServiceEntryApproved);

    config
        .sub_state_mapping
        .insert("archived".to_string(), "request_received".to_string());
    assert!(OrderStateCoordinator::from_config(
        Arc::new(harness.backend.clone()),
        Arc::new(harness.publisher.clone()),
        &config,
    )
    .is_err());
}

use super::{
    context::TransitionContext,
    errors::{validation_denied, DenialCode, StateMachineError, StateMachineResult},
    guards::PreconditionEvaluator,
    persistence::{AuditSink, HistorySink, OrderStore, TransitionBackend, UnitOfWork},
    states::OrderState,
    sub_states::{OrderSubState, SubStateMapper},
    transitions::{reason_is_present, TransitionGraph},
};
use crate::config::LifecycleConfig;
use crate::constants::system::DEFAULT_MAX_NOTE_LENGTH;
use crate::events::{EventBus, OrderStateChanged};
use crate::models::{NewOrderAuditLog, NewOrderStateHistory, OrderSnapshot, OrderStateHistory};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// A request to move an order to a new primary state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeStateRequest {
    pub requested_state: OrderState,
    /// Required, and must contain visible text, for `completed` and `cancelled`
    pub reason: Option<String>,
    pub acting_user: Uuid,
    /// Free text recorded on the history entry; falls back to `reason`
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub context: TransitionContext,
}

impl ChangeStateRequest {
    pub fn new(requested_state: OrderState, acting_user: Uuid) -> Self {
        Self {
            requested_state,
            reason: None,
            acting_user,
            notes: None,
            metadata: None,
            context: TransitionContext::default(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: TransitionContext) -> Self {
        self.context = context;
        self
    }
}

/// Where an order sits in its lifecycle and where it can go next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub order_id: Uuid,
    pub state: OrderState,
    pub sub_state: OrderSubState,
    pub step_number: u8,
    pub allowed_next_states: Vec<OrderState>,
    pub is_final: bool,
}

/// Transactional state-change coordinator for work orders.
///
/// Validates a requested transition against the cancellation window, the
/// transition graph and the remaining preconditions, then writes the order
/// update, the audit entry and the sub-state history entry through a single
/// unit of work. The domain event goes out only after the commit.
#[derive(Clone)]
pub struct OrderStateCoordinator {
    backend: Arc<dyn TransitionBackend>,
    events: Arc<dyn EventBus>,
    evaluator: Arc<PreconditionEvaluator>,
    mapper: SubStateMapper,
    max_note_length: usize,
}

impl std::fmt::Debug for OrderStateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStateCoordinator")
            .field("evaluator", &self.evaluator)
            .field("mapper", &self.mapper)
            .field("max_note_length", &self.max_note_length)
            .finish_non_exhaustive()
    }
}

impl OrderStateCoordinator {
    /// Create a coordinator with the default mapping, guards and note limit
    pub fn new(backend: Arc<dyn TransitionBackend>, events: Arc<dyn EventBus>) -> Self {
        Self {
            backend,
            events,
            evaluator: Arc::new(PreconditionEvaluator::default()),
            mapper: SubStateMapper::default(),
            max_note_length: DEFAULT_MAX_NOTE_LENGTH,
        }
    }

    /// Create a coordinator from lifecycle configuration. Configured mapping
    /// entries override the defaults one by one.
    pub fn from_config(
        backend: Arc<dyn TransitionBackend>,
        events: Arc<dyn EventBus>,
        config: &LifecycleConfig,
    ) -> StateMachineResult<Self> {
        let overrides = SubStateMapper::from_labels(
            config
                .sub_state_mapping
                .iter()
                .map(|(state, label)| (state.as_str(), label.as_str())),
        )?;

        Ok(Self::new(backend, events)
            .with_mapper(SubStateMapper::default().merged_with(overrides))
            .with_max_note_length(config.max_note_length))
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: SubStateMapper) -> Self {
        self.mapper = mapper;
        self
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: PreconditionEvaluator) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    #[must_use]
    pub fn with_max_note_length(mut self, max_note_length: usize) -> Self {
        self.max_note_length = max_note_length;
        self
    }

    pub fn mapper(&self) -> &SubStateMapper {
        &self.mapper
    }

    /// Move an order to `request.requested_state`.
    ///
    /// On success the order row, one audit entry and one history entry are
    /// committed together and an [`OrderStateChanged`] event is published.
    /// On any error nothing is written.
    pub async fn change_state(
        &self,
        order_id: Uuid,
        mut request: ChangeStateRequest,
    ) -> StateMachineResult<OrderSnapshot> {
        let correlation_id = request.context.correlation_id_or_new();
        request.context.correlation_id = Some(correlation_id);
        let span = info_span!(
            "order.change_state",
            order_id = %order_id,
            actor_id = %request.acting_user,
            to_state = %request.requested_state,
            correlation_id = %correlation_id,
        );

        async move {
            info!("State change requested");
            let result = self.apply_change(order_id, request, correlation_id).await;
            match &result {
                Ok((from_state, snapshot)) => info!(
                    from_state = %from_state,
                    sub_state = %snapshot.sub_state,
                    lock_version = snapshot.lock_version,
                    "State change committed"
                ),
                Err(e) => warn!(error_kind = e.kind(), error = %e, "State change rejected"),
            }
            result.map(|(_, snapshot)| snapshot)
        }
        .instrument(span)
        .await
    }

    async fn apply_change(
        &self,
        order_id: Uuid,
        request: ChangeStateRequest,
        correlation_id: Uuid,
    ) -> StateMachineResult<(OrderState, OrderSnapshot)> {
        self.check_text_limits(&request)?;

        let requested = request.requested_state;
        let reason = request
            .reason
            .as_deref()
            .filter(|r| reason_is_present(Some(*r)))
            .map(|r| r.trim().to_string());

        let mut unit = self.backend.begin().await?;
        let order = unit
            .find_by_id(order_id)
            .await?
            .ok_or(StateMachineError::NotFound { order_id })?;

        self.evaluator
            .evaluate_cancellation_window(&order, requested)?;
        TransitionGraph::validate(order.state, requested, reason.is_some()).into_result()?;
        self.evaluator
            .evaluate_guards(&order, requested, &mut unit)
            .await?;

        let now = Utc::now();
        let update = order.state_update(requested, now);
        let updated = unit.update(&update).await?;

        let from_sub_state = self.mapper.map_to_sub_state(order.state)?;
        let to_sub_state = self.mapper.map_to_sub_state(requested)?;

        let audit = NewOrderAuditLog::state_change(
            &order,
            &updated,
            request.acting_user,
            reason.clone(),
            &request.context,
            now,
        );
        AuditSink::append(&mut *unit, audit).await?;

        let history_metadata = request.context.merge_into_metadata(serde_json::json!({
            "from_state": order.state,
            "to_state": requested,
        }));
        let history_metadata = match request.metadata {
            Some(serde_json::Value::Object(extra)) => {
                let mut merged = extra;
                if let serde_json::Value::Object(base) = history_metadata {
                    merged.extend(base);
                }
                serde_json::Value::Object(merged)
            }
            Some(other) => {
                let mut merged = history_metadata;
                if let serde_json::Value::Object(ref mut map) = merged {
                    map.insert("data".to_string(), other);
                }
                merged
            }
            None => history_metadata,
        };
        let history = NewOrderStateHistory {
            order_id,
            from_sub_state,
            to_sub_state,
            actor_id: request.acting_user,
            notes: request.notes.or_else(|| reason.clone()),
            metadata: Some(history_metadata),
            created_at: now,
        };
        HistorySink::append(&mut *unit, history).await?;

        unit.commit().await?;

        let event = OrderStateChanged {
            order_id,
            order_number: updated.order_number.clone(),
            from_state: order.state,
            to_state: requested,
            from_sub_state,
            to_sub_state,
            reason,
            actor_id: request.acting_user,
            correlation_id,
            occurred_at: now,
        };
        if let Err(e) = self.events.publish(event) {
            warn!(error = %e, "Failed to publish order state change event");
        }

        Ok((order.state, OrderSnapshot::new(&updated, to_sub_state)))
    }

    fn check_text_limits(&self, request: &ChangeStateRequest) -> StateMachineResult<()> {
        for (field, value) in [("reason", &request.reason), ("notes", &request.notes)] {
            if let Some(text) = value {
                let length = text.chars().count();
                if length > self.max_note_length {
                    return Err(validation_denied(
                        DenialCode::NoteTooLong,
                        format!(
                            "{field} is {length} characters; the limit is {}",
                            self.max_note_length
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Current state, its sub-state label and the states reachable from it
    pub async fn state_info(&self, order_id: Uuid) -> StateMachineResult<StateInfo> {
        let order = self
            .backend
            .find_order(order_id)
            .await?
            .ok_or(StateMachineError::NotFound { order_id })?;
        let sub_state = self.mapper.map_to_sub_state(order.state)?;

        Ok(StateInfo {
            order_id,
            state: order.state,
            sub_state,
            step_number: sub_state.step_number(),
            allowed_next_states: TransitionGraph::allowed_targets(order.state).to_vec(),
            is_final: TransitionGraph::is_final(order.state),
        })
    }

    /// Sub-state history for an order, newest first
    pub async fn state_history(&self, order_id: Uuid) -> StateMachineResult<Vec<OrderStateHistory>> {
        if self.backend.find_order(order_id).await?.is_none() {
            return Err(StateMachineError::NotFound { order_id });
        }
        Ok(self.backend.list_history(order_id).await?)
    }
}

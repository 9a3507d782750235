use super::errors::{business_rule_violation, resource_unavailable, GuardResult};
use super::persistence::ItemCountLookup;
use super::states::OrderState;
use crate::models::Order;
use async_trait::async_trait;

/// Trait for implementing order transition preconditions
#[async_trait]
pub trait PreconditionGuard: Send + Sync {
    /// Whether this guard has anything to say about moving to `requested`
    fn applies_to(&self, requested: OrderState) -> bool;

    /// Check the precondition, failing with the violated rule
    async fn check(
        &self,
        order: &Order,
        requested: OrderState,
        lookup: &mut dyn ItemCountLookup,
    ) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Cancellation is organizational policy: only orders that have not started
/// execution may be cancelled.
///
/// Not a [`PreconditionGuard`]: the window is checked before the transition
/// graph, so [`PreconditionEvaluator`] calls it directly.
#[derive(Debug, Default)]
pub struct CancellationWindowGuard;

impl CancellationWindowGuard {
    pub fn check_window(order: &Order, requested: OrderState) -> GuardResult<()> {
        if requested != OrderState::Cancelled || order.state.within_cancellation_window() {
            return Ok(());
        }
        Err(business_rule_violation(format!(
            "Order {} cannot be cancelled from state {}; cancellation is only possible from pending or planning",
            order.order_number, order.state
        )))
    }
}

/// Guard to check an actor is assigned before execution starts
#[derive(Debug, Default)]
pub struct AssignedActorGuard;

#[async_trait]
impl PreconditionGuard for AssignedActorGuard {
    fn applies_to(&self, requested: OrderState) -> bool {
        requested == OrderState::Execution
    }

    async fn check(
        &self,
        order: &Order,
        _requested: OrderState,
        _lookup: &mut dyn ItemCountLookup,
    ) -> GuardResult<()> {
        if order.has_assigned_actor() {
            Ok(())
        } else {
            Err(resource_unavailable(format!(
                "Order {} has no assigned technician",
                order.order_number
            )))
        }
    }

    fn description(&self) -> &'static str {
        "Order must have an assigned actor to start execution"
    }
}

/// Guard to check the order has content before execution starts
#[derive(Debug, Default)]
pub struct HasItemsGuard;

#[async_trait]
impl PreconditionGuard for HasItemsGuard {
    fn applies_to(&self, requested: OrderState) -> bool {
        requested == OrderState::Execution
    }

    async fn check(
        &self,
        order: &Order,
        _requested: OrderState,
        lookup: &mut dyn ItemCountLookup,
    ) -> GuardResult<()> {
        let count = lookup.count_items(order.order_id).await?;
        if count > 0 {
            Ok(())
        } else {
            Err(business_rule_violation(format!(
                "Order {} has no items; add at least one before starting execution",
                order.order_number
            )))
        }
    }

    fn description(&self) -> &'static str {
        "Order must have at least one item to start execution"
    }
}

/// Runs the precondition guards for a requested transition.
///
/// The cancellation window is checked separately, ahead of the transition
/// graph. The remaining guards run after the graph accepts the pair.
pub struct PreconditionEvaluator {
    guards: Vec<Box<dyn PreconditionGuard>>,
}

impl std::fmt::Debug for PreconditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.guards.iter().map(|g| g.description()).collect();
        f.debug_struct("PreconditionEvaluator")
            .field("guards", &names)
            .finish()
    }
}

impl Default for PreconditionEvaluator {
    fn default() -> Self {
        Self::new(vec![Box::new(AssignedActorGuard), Box::new(HasItemsGuard)])
    }
}

impl PreconditionEvaluator {
    pub fn new(guards: Vec<Box<dyn PreconditionGuard>>) -> Self {
        Self { guards }
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    pub fn evaluate_cancellation_window(
        &self,
        order: &Order,
        requested: OrderState,
    ) -> GuardResult<()> {
        CancellationWindowGuard::check_window(order, requested)
    }

    /// Run the post-graph guards that apply to `requested`, stopping at the
    /// first failure
    pub async fn evaluate_guards(
        &self,
        order: &Order,
        requested: OrderState,
        lookup: &mut dyn ItemCountLookup,
    ) -> GuardResult<()> {
        for guard in self.guards.iter().filter(|g| g.applies_to(requested)) {
            if let Err(e) = guard.check(order, requested, lookup).await {
                tracing::debug!(
                    order_id = %order.order_id,
                    guard = guard.description(),
                    error = %e,
                    "Precondition failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Full evaluation: cancellation window, then every applicable guard.
    /// Read-only, so safe to call repeatedly.
    pub async fn evaluate(
        &self,
        order: &Order,
        requested: OrderState,
        lookup: &mut dyn ItemCountLookup,
    ) -> GuardResult<()> {
        self.evaluate_cancellation_window(order, requested)?;
        self.evaluate_guards(order, requested, lookup).await
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::catalog::Service;
use crate::domain::Requester;
use crate::eventing::{Aggregate, EventEnvelope};
use crate::metrics::Metrics;
use crate::store::{OrderQuery, OrderStore, OrderTransaction};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::{DraftCreated, OrderEvent};
use super::value_objects::{DraftSummary, ItemPatch, OrderFilter, OrderItem, OrderStatus, ParametersPatch};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Store (one transaction)
//
// Every write locks the order row first, so two moderators completing the
// same order are serialised and the second sees COMPLETED.
//
// ============================================================================

pub const DEFAULT_DELIVERY_LEAD_DAYS: i64 = 30;

/// Result of completing an order.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub order: OrderAggregate,
    /// Completion time plus the configured delivery lead
    pub delivery_date: DateTime<Utc>,
}

/// How a command finds its order.
#[derive(Debug, Clone, Copy)]
enum Target {
    Order(Uuid),
    Item(Uuid),
}

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
    delivery_lead: Duration,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            delivery_lead: Duration::days(DEFAULT_DELIVERY_LEAD_DAYS),
        }
    }

    pub fn with_delivery_lead(mut self, delivery_lead: Duration) -> Self {
        self.delivery_lead = delivery_lead;
        self
    }

    // ------------------------------------------------------------------------
    // Draft
    // ------------------------------------------------------------------------

    /// The requester's DRAFT order, created on first use.
    pub async fn get_or_create_draft(&self, requester: Requester) -> Result<OrderAggregate, OrderError> {
        self.observe("get_or_create_draft", async {
            let correlation_id = Uuid::now_v7();
            let mut tx = self.store.begin().await?;
            let draft = Self::draft_in(tx.as_mut(), requester, correlation_id).await?;
            tx.commit().await?;
            Ok(draft)
        })
        .await
    }

    /// Current draft id and item count, without creating a draft.
    pub async fn draft_summary(&self, requester: Requester) -> Result<DraftSummary, OrderError> {
        let draft = self.store.find_draft(requester.user_id).await?;
        Ok(DraftSummary {
            order_id: draft.as_ref().map(|order| order.id),
            item_count: draft.map_or(0, |order| order.items.len()),
        })
    }

    /// Get-or-create the requester's draft and add a service to it, atomically.
    pub async fn add_service_to_draft(
        &self,
        requester: Requester,
        service_id: Uuid,
    ) -> Result<(Uuid, OrderItem), OrderError> {
        self.observe("add_service_to_draft", async {
            let correlation_id = Uuid::now_v7();
            let mut tx = self.store.begin().await?;

            let service = Self::active_service(tx.as_mut(), service_id).await?;
            let mut draft = Self::draft_in(tx.as_mut(), requester, correlation_id).await?;
            let command = OrderCommand::AddItem { requester, item_id: Uuid::now_v7(), service };
            Self::apply(tx.as_mut(), &mut draft, &command, correlation_id).await?;
            tx.commit().await?;

            let item = Self::item_for_service(&draft, service_id)?;
            tracing::info!(order_id = %draft.id, service_id = %service_id, "Service added to draft");
            Ok((draft.id, item))
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    /// Add a service to an order. Adding a service twice returns the existing item.
    pub async fn add_item(
        &self,
        requester: Requester,
        order_id: Uuid,
        service_id: Uuid,
    ) -> Result<OrderItem, OrderError> {
        self.observe("add_item", async {
            let correlation_id = Uuid::now_v7();
            let mut tx = self.store.begin().await?;

            let mut order = Self::lock_live(tx.as_mut(), order_id).await?;
            let service = Self::active_service(tx.as_mut(), service_id).await?;
            let command = OrderCommand::AddItem { requester, item_id: Uuid::now_v7(), service };
            Self::apply(tx.as_mut(), &mut order, &command, correlation_id).await?;
            tx.commit().await?;

            Self::item_for_service(&order, service_id)
        })
        .await
    }

    pub async fn remove_item(&self, requester: Requester, item_id: Uuid) -> Result<OrderAggregate, OrderError> {
        self.run(Target::Item(item_id), OrderCommand::RemoveItem { requester, item_id })
            .await
    }

    pub async fn update_item(
        &self,
        requester: Requester,
        item_id: Uuid,
        patch: ItemPatch,
    ) -> Result<OrderItem, OrderError> {
        let order = self
            .run(Target::Item(item_id), OrderCommand::UpdateItem { requester, item_id, patch })
            .await?;

        order.item(item_id).cloned().ok_or(OrderError::ItemNotFound(item_id))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub async fn set_parameters(
        &self,
        requester: Requester,
        order_id: Uuid,
        patch: ParametersPatch,
    ) -> Result<OrderAggregate, OrderError> {
        self.run_on(order_id, OrderCommand::SetParameters { requester, patch }).await
    }

    pub async fn form_order(&self, requester: Requester, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        self.run_on(order_id, OrderCommand::Form { requester, at: Utc::now() }).await
    }

    /// Stamp every item's runtime and close the order.
    pub async fn complete_order(&self, requester: Requester, order_id: Uuid) -> Result<Completion, OrderError> {
        let order = self
            .run_on(order_id, OrderCommand::Complete { requester, at: Utc::now() })
            .await?;

        for item in &order.items {
            if let Some(minutes) = item.runtime {
                self.metrics.record_runtime(minutes);
            }
        }

        let completed_at = order.completed_at.unwrap_or_else(Utc::now);
        Ok(Completion {
            delivery_date: completed_at + self.delivery_lead,
            order,
        })
    }

    pub async fn reject_order(&self, requester: Requester, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        self.run_on(order_id, OrderCommand::Reject { requester, at: Utc::now() }).await
    }

    pub async fn soft_delete_order(&self, requester: Requester, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        self.run_on(order_id, OrderCommand::SoftDelete { requester, at: Utc::now() }).await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// An order visible to the requester. Deleted orders do not exist here.
    pub async fn get_order(&self, requester: Requester, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .filter(|order| order.status != OrderStatus::Deleted)
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if !order.is_visible_to(&requester) {
            return Err(OrderError::Forbidden { action: "view" });
        }

        tracing::debug!(order_id = %order.id, status = %order.status, "Order loaded");
        Ok(order)
    }

    /// Submitted orders. Staff see everyone's, other users their own.
    pub async fn list_orders(
        &self,
        requester: Requester,
        filter: &OrderFilter,
    ) -> Result<Vec<OrderAggregate>, OrderError> {
        let creator_id = (!requester.is_staff).then_some(requester.user_id);
        let query = OrderQuery::from_filter(filter, creator_id);

        let orders = self.store.list_orders(&query).await?;
        tracing::debug!(count = orders.len(), staff = requester.is_staff, "Orders listed");
        Ok(orders)
    }

    /// Audit events of an order, oldest first.
    pub async fn order_history(
        &self,
        requester: Requester,
        order_id: Uuid,
    ) -> Result<Vec<EventEnvelope<OrderEvent>>, OrderError> {
        let order = self.get_order(requester, order_id).await?;
        Ok(self.store.load_events(order.id).await?)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn run_on(&self, order_id: Uuid, command: OrderCommand) -> Result<OrderAggregate, OrderError> {
        self.run(Target::Order(order_id), command).await
    }

    /// Resolve the target order, lock it, execute and persist, in one transaction.
    async fn run(&self, target: Target, command: OrderCommand) -> Result<OrderAggregate, OrderError> {
        self.observe(command.name(), async {
            let correlation_id = Uuid::now_v7();
            let mut tx = self.store.begin().await?;

            let order_id = match target {
                Target::Order(order_id) => order_id,
                Target::Item(item_id) => tx
                    .order_id_for_item(item_id)
                    .await?
                    .ok_or(OrderError::ItemNotFound(item_id))?,
            };
            let mut order = Self::lock(tx.as_mut(), order_id).await?;
            // Deleted orders only exist for SoftDelete, which reports the transition error
            if order.status == OrderStatus::Deleted && !matches!(command, OrderCommand::SoftDelete { .. }) {
                return Err(match target {
                    Target::Order(order_id) => OrderError::OrderNotFound(order_id),
                    Target::Item(item_id) => OrderError::ItemNotFound(item_id),
                });
            }
            let from = order.status;

            let changed = Self::apply(tx.as_mut(), &mut order, &command, correlation_id).await?;
            tx.commit().await?;

            if changed && from != order.status {
                self.metrics.record_transition(from.as_str(), order.status.as_str());
                tracing::info!(
                    order_id = %order.id,
                    from = %from,
                    to = %order.status,
                    user_id = %command.requester().user_id,
                    "Order status changed"
                );
            }
            Ok(order)
        })
        .await
    }

    /// Time a command and count its failures.
    async fn observe<T>(
        &self,
        command: &'static str,
        operation: impl Future<Output = Result<T, OrderError>>,
    ) -> Result<T, OrderError> {
        let started = Instant::now();
        let result = operation.await;
        self.metrics.record_duration(command, started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            let kind = e.kind();
            self.metrics.record_failure(command, kind.as_str());
            tracing::debug!(command, kind = kind.as_str(), error = %e, "Order command refused");
        }
        result
    }

    async fn lock(tx: &mut dyn OrderTransaction, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        tx.lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Like `lock`, but a deleted order is not found.
    async fn lock_live(tx: &mut dyn OrderTransaction, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        tx.lock_order(order_id)
            .await?
            .filter(|order| order.status != OrderStatus::Deleted)
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    async fn active_service(
        tx: &mut dyn OrderTransaction,
        service_id: Uuid,
    ) -> Result<Service, OrderError> {
        tx.find_service(service_id)
            .await?
            .filter(|service| service.is_active())
            .ok_or(OrderError::ServiceNotFound(service_id))
    }

    async fn draft_in(
        tx: &mut dyn OrderTransaction,
        requester: Requester,
        correlation_id: Uuid,
    ) -> Result<OrderAggregate, OrderError> {
        let created = OrderEvent::DraftCreated(DraftCreated {
            creator_id: requester.user_id,
            created_at: Utc::now(),
        });
        let candidate = OrderAggregate::from_first_event(Uuid::now_v7(), &created)?;

        let (draft, inserted) = tx.get_or_create_draft(&candidate).await?;
        if inserted {
            let envelope = EventEnvelope::new(draft.id, 1, created, correlation_id)
                .with_user(requester.user_id)
                .with_metadata("command", "get_or_create_draft");
            tx.append_events(&[envelope]).await?;
            tracing::info!(order_id = %draft.id, creator_id = %requester.user_id, "Draft order created");
        }
        Ok(draft)
    }

    /// Execute a command on a locked order and write its effects.
    /// Returns false when the command produced no events.
    async fn apply(
        tx: &mut dyn OrderTransaction,
        order: &mut OrderAggregate,
        command: &OrderCommand,
        correlation_id: Uuid,
    ) -> Result<bool, OrderError> {
        let prior_version = order.version();
        let events = order.execute(command)?;
        if events.is_empty() {
            return Ok(false);
        }

        let user_id = command.requester().user_id;
        let envelopes: Vec<_> = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| {
                EventEnvelope::new(order.id, prior_version + i as i64 + 1, event, correlation_id)
                    .with_user(user_id)
                    .with_metadata("command", command.name())
            })
            .collect();

        tx.save_order(order).await?;
        tx.append_events(&envelopes).await?;
        Ok(true)
    }

    fn item_for_service(order: &OrderAggregate, service_id: Uuid) -> Result<OrderItem, OrderError> {
        order
            .item_for_service(service_id)
            .cloned()
            .ok_or(OrderError::ServiceNotFound(service_id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

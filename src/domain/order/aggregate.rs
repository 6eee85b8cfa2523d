use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::estimator;
use crate::domain::Requester;
use crate::eventing::Aggregate;
use super::value_objects::{DroneParameters, OrderItem, OrderStatus, DEFAULT_WEATHER_MULTIPLIER};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Transitions:
//   DRAFT -> FORMED -> COMPLETED | REJECTED
//   DRAFT -> DELETED
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    pub creator_id: Uuid,
    pub moderator_id: Option<Uuid>,
    pub status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub parameters: DroneParameters,
    pub items: Vec<OrderItem>,
}

impl OrderAggregate {
    /// Create the aggregate from its first event
    pub fn from_first_event(id: Uuid, event: &OrderEvent) -> Result<Self, OrderError> {
        match event {
            OrderEvent::DraftCreated(e) => Ok(Self {
                id,
                version: 1,
                creator_id: e.creator_id,
                moderator_id: None,
                status: OrderStatus::Draft,
                created_at: e.created_at,
                formed_at: None,
                completed_at: None,
                parameters: DroneParameters::default(),
                items: Vec::new(),
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_for_service(&self, service_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.service_id == service_id)
    }

    /// Runtime estimate for an item under the current parameters
    pub fn estimate(&self, item: &OrderItem) -> i32 {
        estimator::estimate(&self.parameters, item)
    }

    pub fn is_visible_to(&self, requester: &Requester) -> bool {
        requester.is_staff || requester.user_id == self.creator_id
    }

    fn require_status(&self, expected: OrderStatus, action: &'static str) -> Result<(), OrderError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition { action, status: self.status })
        }
    }

    fn require_creator(&self, requester: &Requester, action: &'static str) -> Result<(), OrderError> {
        if requester.user_id == self.creator_id {
            Ok(())
        } else {
            Err(OrderError::Forbidden { action })
        }
    }

    fn require_creator_or_staff(&self, requester: &Requester, action: &'static str) -> Result<(), OrderError> {
        if self.is_visible_to(requester) {
            Ok(())
        } else {
            Err(OrderError::Forbidden { action })
        }
    }

    fn require_staff(requester: &Requester, action: &'static str) -> Result<(), OrderError> {
        if requester.is_staff {
            Ok(())
        } else {
            Err(OrderError::Forbidden { action })
        }
    }

    fn item_mut(&mut self, item_id: Uuid) -> Result<&mut OrderItem, OrderError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(OrderError::ItemNotFound(item_id))
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::DraftCreated(_) => {
                // First event already applied
            }
            OrderEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            OrderEvent::ItemRemoved(e) => {
                self.items.retain(|item| item.id != e.item_id);
            }
            OrderEvent::ItemUpdated(e) => {
                let item = self.item_mut(e.item_id)?;
                e.patch.apply_to(item);
            }
            OrderEvent::ParametersUpdated(e) => {
                self.parameters.apply(&e.patch);
            }
            OrderEvent::Formed(e) => {
                self.status = OrderStatus::Formed;
                self.formed_at = Some(e.formed_at);
            }
            OrderEvent::Completed(e) => {
                for runtime in &e.runtimes {
                    self.item_mut(runtime.item_id)?.runtime = Some(runtime.minutes);
                }
                self.status = OrderStatus::Completed;
                self.moderator_id = Some(e.moderator_id);
                self.completed_at = Some(e.completed_at);
            }
            OrderEvent::Rejected(e) => {
                self.status = OrderStatus::Rejected;
                self.moderator_id = Some(e.moderator_id);
                self.completed_at = Some(e.rejected_at);
            }
            OrderEvent::Deleted(_) => {
                self.status = OrderStatus::Deleted;
            }
        }

        self.version += 1;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::AddItem { requester, item_id, service } => {
                self.require_creator(requester, "add items to")?;
                self.require_status(OrderStatus::Draft, "add items to")?;
                if !service.is_active() {
                    return Err(OrderError::ServiceNotFound(service.id));
                }

                // Re-adding a service is a no-op
                if self.item_for_service(service.id).is_some() {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::ItemAdded(ItemAdded {
                    item: OrderItem {
                        id: *item_id,
                        service_id: service.id,
                        service_name: service.name.clone(),
                        power_multiplier: service.power_multiplier,
                        wind_multiplier: DEFAULT_WEATHER_MULTIPLIER,
                        rain_multiplier: DEFAULT_WEATHER_MULTIPLIER,
                        runtime: None,
                        description: None,
                    },
                })])
            }

            OrderCommand::RemoveItem { requester, item_id } => {
                self.require_creator_or_staff(requester, "remove items from")?;
                if self.status.is_terminal() {
                    return Err(OrderError::InvalidTransition {
                        action: "remove items from",
                        status: self.status,
                    });
                }
                let item = self.item(*item_id).ok_or(OrderError::ItemNotFound(*item_id))?;

                Ok(vec![OrderEvent::ItemRemoved(ItemRemoved {
                    item_id: item.id,
                    service_id: item.service_id,
                })])
            }

            OrderCommand::UpdateItem { requester, item_id, patch } => {
                self.require_creator_or_staff(requester, "edit items of")?;
                self.require_status(OrderStatus::Draft, "edit items of")?;
                if self.item(*item_id).is_none() {
                    return Err(OrderError::ItemNotFound(*item_id));
                }
                patch.validate()?;

                if patch.is_empty() {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::ItemUpdated(ItemUpdated {
                    item_id: *item_id,
                    patch: patch.clone(),
                })])
            }

            OrderCommand::SetParameters { requester, patch } => {
                self.require_creator_or_staff(requester, "set parameters of")?;
                self.require_status(OrderStatus::Draft, "set parameters of")?;
                patch.validate()?;

                if patch.is_empty() {
                    return Ok(vec![]);
                }

                Ok(vec![OrderEvent::ParametersUpdated(ParametersUpdated { patch: *patch })])
            }

            OrderCommand::Form { requester, at } => {
                self.require_creator(requester, "form")?;
                self.require_status(OrderStatus::Draft, "form")?;
                if let Some(field) = self.parameters.missing_field() {
                    return Err(OrderError::IncompleteParameters(field));
                }

                Ok(vec![OrderEvent::Formed(OrderFormed { formed_at: *at })])
            }

            OrderCommand::Complete { requester, at } => {
                Self::require_staff(requester, "complete")?;
                self.require_status(OrderStatus::Formed, "complete")?;

                let runtimes = self
                    .items
                    .iter()
                    .map(|item| ItemRuntime {
                        item_id: item.id,
                        minutes: self.estimate(item),
                    })
                    .collect();

                Ok(vec![OrderEvent::Completed(OrderCompleted {
                    moderator_id: requester.user_id,
                    completed_at: *at,
                    runtimes,
                })])
            }

            OrderCommand::Reject { requester, at } => {
                Self::require_staff(requester, "reject")?;
                self.require_status(OrderStatus::Formed, "reject")?;

                Ok(vec![OrderEvent::Rejected(OrderRejected {
                    moderator_id: requester.user_id,
                    rejected_at: *at,
                })])
            }

            OrderCommand::SoftDelete { requester, at } => {
                self.require_creator(requester, "delete")?;
                self.require_status(OrderStatus::Draft, "delete")?;

                Ok(vec![OrderEvent::Deleted(OrderDeleted {
                    deleted_by: requester.user_id,
                    deleted_at: *at,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::eventing::DomainEvent;
use super::value_objects::{ItemPatch, OrderItem, ParametersPatch};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    DraftCreated(DraftCreated),
    ItemAdded(ItemAdded),
    ItemRemoved(ItemRemoved),
    ItemUpdated(ItemUpdated),
    ParametersUpdated(ParametersUpdated),
    Formed(OrderFormed),
    Completed(OrderCompleted),
    Rejected(OrderRejected),
    Deleted(OrderDeleted),
}

impl DomainEvent for OrderEvent {
    fn event_name(&self) -> &'static str {
        match self {
            OrderEvent::DraftCreated(_) => "OrderDraftCreated",
            OrderEvent::ItemAdded(_) => "OrderItemAdded",
            OrderEvent::ItemRemoved(_) => "OrderItemRemoved",
            OrderEvent::ItemUpdated(_) => "OrderItemUpdated",
            OrderEvent::ParametersUpdated(_) => "OrderParametersUpdated",
            OrderEvent::Formed(_) => "OrderFormed",
            OrderEvent::Completed(_) => "OrderCompleted",
            OrderEvent::Rejected(_) => "OrderRejected",
            OrderEvent::Deleted(_) => "OrderDeleted",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Draft Created - Initial event in order lifecycle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DraftCreated {
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemAdded {
    pub item: OrderItem,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemRemoved {
    pub item_id: Uuid,
    pub service_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemUpdated {
    pub item_id: Uuid,
    pub patch: ItemPatch,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParametersUpdated {
    pub patch: ParametersPatch,
}

/// Order Formed - Draft submitted for moderation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderFormed {
    pub formed_at: DateTime<Utc>,
}

/// Estimated runtime computed for one item at completion.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ItemRuntime {
    pub item_id: Uuid,
    pub minutes: i32,
}

/// Order Completed - Approved by a moderator, runtimes stamped
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCompleted {
    pub moderator_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub runtimes: Vec<ItemRuntime>,
}

/// Order Rejected - Declined by a moderator
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderRejected {
    pub moderator_id: Uuid,
    pub rejected_at: DateTime<Utc>,
}

/// Order Deleted - Draft discarded by its creator
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderDeleted {
    pub deleted_by: Uuid,
    pub deleted_at: DateTime<Utc>,
}

// ============================================================================
// Store - Persistence Collaborators
// ============================================================================
//
// The domain reaches the relational store only through these traits.
//
// - ServiceRepository: catalog rows; every write is a single atomic step
// - OrderStore:        reads, plus `begin()` for a unit of work
// - OrderTransaction:  everything one order operation writes, committed
//                      atomically; dropping it without `commit` rolls back
//
// Implementations: InMemoryStore (tests, demo) and PgStore (Postgres).
//
// ============================================================================

mod records;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::{Service, ServiceFilter, ServicePatch};
use crate::domain::order::{OrderAggregate, OrderEvent, OrderFilter, OrderStatus};
use crate::eventing::EventEnvelope;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Constraint violated: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Order listing query as seen by the store.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Restrict to one creator; `None` lists every creator's orders
    pub creator_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    pub fn from_filter(filter: &OrderFilter, creator_id: Option<Uuid>) -> Self {
        Self {
            creator_id,
            date_from: filter.date_from,
            date_to: filter.date_to,
            status: filter.status,
        }
    }

    /// Drafts and deleted orders never appear in listings.
    pub fn matches(&self, order: &OrderAggregate) -> bool {
        if matches!(order.status, OrderStatus::Draft | OrderStatus::Deleted) {
            return false;
        }
        if self.creator_id.is_some_and(|creator| creator != order.creator_id) {
            return false;
        }
        if self.status.is_some_and(|status| status != order.status) {
            return false;
        }
        if let Some(from) = self.date_from {
            if order.formed_at.map_or(true, |formed| formed < from) {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if order.formed_at.map_or(true, |formed| formed > to) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// Active services matching the filter, ordered by name
    async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, StoreError>;

    /// A service by id, including soft-deleted ones
    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, StoreError>;

    async fn insert_service(&self, service: &Service) -> Result<(), StoreError>;

    /// Write a validated patch to an active service in one atomic step
    async fn patch_service(&self, id: Uuid, patch: &ServicePatch) -> Result<Option<Service>, StoreError>;

    /// Point an active service at a new image key. Returns the updated
    /// service and the key it replaced.
    async fn replace_service_image(
        &self,
        id: Uuid,
        key: &str,
    ) -> Result<Option<(Service, Option<String>)>, StoreError>;

    /// Mark an active service deleted and clear its image. Returns the
    /// updated service and the cleared key.
    async fn delete_service(&self, id: Uuid) -> Result<Option<(Service, Option<String>)>, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError>;

    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<OrderAggregate>, StoreError>;

    /// Orders matching the query, ordered by formation time
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderAggregate>, StoreError>;

    /// Audit log of an order, in sequence order
    async fn load_events(&self, order_id: Uuid) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError>;
}

#[async_trait]
pub trait OrderTransaction: Send {
    async fn find_service(&mut self, id: Uuid) -> Result<Option<Service>, StoreError>;

    /// Load an order and hold it exclusively until commit or rollback
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError>;

    async fn order_id_for_item(&mut self, item_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Return the creator's locked DRAFT order, inserting `candidate` if there
    /// is none. The flag is true when `candidate` was inserted.
    async fn get_or_create_draft(
        &mut self,
        candidate: &OrderAggregate,
    ) -> Result<(OrderAggregate, bool), StoreError>;

    /// Persist header fields and the item set of an already inserted order
    async fn save_order(&mut self, order: &OrderAggregate) -> Result<(), StoreError>;

    async fn append_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

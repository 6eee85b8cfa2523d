use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::catalog::{Service, ServiceFilter, ServicePatch};
use crate::domain::order::{OrderAggregate, OrderEvent, OrderStatus};
use crate::eventing::EventEnvelope;
use super::records::{EventRecord, ItemRecord, OrderRecord};
use super::{OrderQuery, OrderStore, OrderTransaction, ServiceRepository, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A transaction takes the store mutex for its whole lifetime and works on a
// copy of the tables. Commit swaps the copy in; drop discards it. Every
// transaction is therefore serialised, which is what makes get-or-create and
// moderator locking race-free here.
//
// Store-level reads also take the mutex, so they must not be awaited while
// the same task holds an open transaction.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Tables {
    services: HashMap<Uuid, Service>,
    orders: HashMap<Uuid, OrderRecord>,
    items: HashMap<Uuid, ItemRecord>,
    events: Vec<EventRecord>,
}

impl Tables {
    fn load_order(&self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let Some(record) = self.orders.get(&id) else {
            return Ok(None);
        };

        let mut items: Vec<ItemRecord> = self
            .items
            .values()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);

        // Join the catalog columns
        for item in &mut items {
            if let Some(service) = self.services.get(&item.service_id) {
                item.service_name = service.name.clone();
                item.power_multiplier = service.power_multiplier;
            }
        }

        record
            .clone()
            .into_aggregate(items.into_iter().map(ItemRecord::into_item).collect())
            .map(Some)
    }

    fn active_service_mut(&mut self, id: Uuid) -> Option<&mut Service> {
        self.services.get_mut(&id).filter(|service| service.is_active())
    }

    fn draft_id(&self, creator_id: Uuid) -> Option<Uuid> {
        self.orders
            .values()
            .find(|order| order.creator_id == creator_id && order.status == OrderStatus::Draft.as_str())
            .map(|order| order.id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceRepository for InMemoryStore {
    async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, StoreError> {
        let tables = self.tables.lock().await;
        let mut services: Vec<Service> = tables
            .services
            .values()
            .filter(|service| service.is_active() && filter.matches(service))
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(services)
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        Ok(self.tables.lock().await.services.get(&id).cloned())
    }

    async fn insert_service(&self, service: &Service) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.services.contains_key(&service.id) {
            return Err(StoreError::Conflict(format!("service {} already exists", service.id)));
        }
        tables.services.insert(service.id, service.clone());
        Ok(())
    }

    async fn patch_service(&self, id: Uuid, patch: &ServicePatch) -> Result<Option<Service>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.active_service_mut(id).map(|service| {
            patch.write_to(service);
            service.clone()
        }))
    }

    async fn replace_service_image(
        &self,
        id: Uuid,
        key: &str,
    ) -> Result<Option<(Service, Option<String>)>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.active_service_mut(id).map(|service| {
            let previous = service.image.replace(key.to_string());
            (service.clone(), previous)
        }))
    }

    async fn delete_service(&self, id: Uuid) -> Result<Option<(Service, Option<String>)>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.active_service_mut(id).map(|service| {
            service.is_deleted = true;
            let previous = service.image.take();
            (service.clone(), previous)
        }))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        self.tables.lock().await.load_order(id)
    }

    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let tables = self.tables.lock().await;
        match tables.draft_id(creator_id) {
            Some(id) => tables.load_order(id),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderAggregate>, StoreError> {
        let tables = self.tables.lock().await;
        let mut orders = Vec::new();
        for id in tables.orders.keys() {
            if let Some(order) = tables.load_order(*id)? {
                if query.matches(&order) {
                    orders.push(order);
                }
            }
        }
        orders.sort_by_key(|order| (order.formed_at, order.id));
        Ok(orders)
    }

    async fn load_events(&self, order_id: Uuid) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<EventRecord> = tables
            .events
            .iter()
            .filter(|event| event.order_id == order_id)
            .cloned()
            .collect();
        records.sort_by_key(|event| event.sequence_number);
        records.into_iter().map(EventRecord::into_envelope).collect()
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl OrderTransaction for MemoryTransaction {
    async fn find_service(&mut self, id: Uuid) -> Result<Option<Service>, StoreError> {
        Ok(self.working.services.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        // The whole store is already held by this transaction
        self.working.load_order(id)
    }

    async fn order_id_for_item(&mut self, item_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.working.items.get(&item_id).map(|item| item.order_id))
    }

    async fn get_or_create_draft(
        &mut self,
        candidate: &OrderAggregate,
    ) -> Result<(OrderAggregate, bool), StoreError> {
        if let Some(id) = self.working.draft_id(candidate.creator_id) {
            let existing = self
                .working
                .load_order(id)?
                .ok_or_else(|| StoreError::Corrupt(format!("draft {} vanished", id)))?;
            return Ok((existing, false));
        }

        if self.working.orders.contains_key(&candidate.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", candidate.id)));
        }
        self.working
            .orders
            .insert(candidate.id, OrderRecord::from_aggregate(candidate));
        Ok((candidate.clone(), true))
    }

    async fn save_order(&mut self, order: &OrderAggregate) -> Result<(), StoreError> {
        if !self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} was never inserted", order.id)));
        }

        let mut seen_services = HashMap::new();
        for item in &order.items {
            if let Some(other) = seen_services.insert(item.service_id, item.id) {
                return Err(StoreError::Conflict(format!(
                    "service {} appears twice in order {} (items {} and {})",
                    item.service_id, order.id, other, item.id
                )));
            }
        }

        self.working
            .orders
            .insert(order.id, OrderRecord::from_aggregate(order));
        self.working
            .items
            .retain(|id, item| item.order_id != order.id || order.item(*id).is_some());
        for item in &order.items {
            self.working
                .items
                .insert(item.id, ItemRecord::from_item(order.id, item));
        }
        Ok(())
    }

    async fn append_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError> {
        for envelope in events {
            let duplicate = self.working.events.iter().any(|event| {
                event.order_id == envelope.aggregate_id
                    && event.sequence_number == envelope.sequence_number
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "event {} of order {} already recorded",
                    envelope.sequence_number, envelope.aggregate_id
                )));
            }
            self.working.events.push(EventRecord::from_envelope(envelope)?);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

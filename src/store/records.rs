use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::order::{DroneParameters, OrderAggregate, OrderEvent, OrderItem};
use crate::eventing::{deserialize_event, serialize_event, EventEnvelope};
use super::StoreError;

// ============================================================================
// Row Records - shared by every store implementation
// ============================================================================

/// A row of `drone_orders`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct OrderRecord {
    pub id: Uuid,
    pub version: i64,
    pub creator_id: Uuid,
    pub moderator_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub formed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub drone_weight: Option<f64>,
    pub cargo_weight: Option<f64>,
    pub battery_capacity: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub efficiency: Option<f64>,
    pub battery_remaining: Option<f64>,
}

impl OrderRecord {
    pub fn from_aggregate(order: &OrderAggregate) -> Self {
        let p = &order.parameters;
        Self {
            id: order.id,
            version: order.version,
            creator_id: order.creator_id,
            moderator_id: order.moderator_id,
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            formed_at: order.formed_at,
            completed_at: order.completed_at,
            drone_weight: p.drone_weight,
            cargo_weight: p.cargo_weight,
            battery_capacity: p.battery_capacity,
            battery_voltage: p.battery_voltage,
            efficiency: p.efficiency,
            battery_remaining: p.battery_remaining,
        }
    }

    pub fn into_aggregate(self, items: Vec<OrderItem>) -> Result<OrderAggregate, StoreError> {
        let status = self
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", self.id, e)))?;

        Ok(OrderAggregate {
            id: self.id,
            version: self.version,
            creator_id: self.creator_id,
            moderator_id: self.moderator_id,
            status,
            created_at: self.created_at,
            formed_at: self.formed_at,
            completed_at: self.completed_at,
            parameters: DroneParameters {
                drone_weight: self.drone_weight,
                cargo_weight: self.cargo_weight,
                battery_capacity: self.battery_capacity,
                battery_voltage: self.battery_voltage,
                efficiency: self.efficiency,
                battery_remaining: self.battery_remaining,
            },
            items,
        })
    }
}

/// A row of `drone_order_items`, joined with its service's name and multiplier.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ItemRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub power_multiplier: f64,
    pub wind_multiplier: f64,
    pub rain_multiplier: f64,
    pub runtime: Option<i32>,
    pub description: Option<String>,
}

impl ItemRecord {
    pub fn from_item(order_id: Uuid, item: &OrderItem) -> Self {
        Self {
            id: item.id,
            order_id,
            service_id: item.service_id,
            service_name: item.service_name.clone(),
            power_multiplier: item.power_multiplier,
            wind_multiplier: item.wind_multiplier,
            rain_multiplier: item.rain_multiplier,
            runtime: item.runtime,
            description: item.description.clone(),
        }
    }

    pub fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            service_id: self.service_id,
            service_name: self.service_name,
            power_multiplier: self.power_multiplier,
            wind_multiplier: self.wind_multiplier,
            rain_multiplier: self.rain_multiplier,
            runtime: self.runtime,
            description: self.description,
        }
    }
}

/// A row of the `drone_order_events` audit log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EventRecord {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub sequence_number: i64,
    pub event_type: String,
    pub event_version: i32,
    pub event_data: String,
    pub correlation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub metadata: String,
}

impl EventRecord {
    pub fn from_envelope(envelope: &EventEnvelope<OrderEvent>) -> Result<Self, StoreError> {
        Ok(Self {
            event_id: envelope.event_id,
            order_id: envelope.aggregate_id,
            sequence_number: envelope.sequence_number,
            event_type: envelope.event_type.clone(),
            event_version: envelope.event_version,
            event_data: serialize_event(&envelope.event_data)?,
            correlation_id: envelope.correlation_id,
            user_id: envelope.user_id,
            created_at: envelope.timestamp,
            metadata: serialize_event(&envelope.metadata)?,
        })
    }

    pub fn into_envelope(self) -> Result<EventEnvelope<OrderEvent>, StoreError> {
        let metadata: HashMap<String, String> = deserialize_event(&self.metadata)?;
        Ok(EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.order_id,
            sequence_number: self.sequence_number,
            event_type: self.event_type,
            event_version: self.event_version,
            event_data: deserialize_event(&self.event_data)?,
            correlation_id: self.correlation_id,
            user_id: self.user_id,
            timestamp: self.created_at,
            metadata,
        })
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Lifecycle status of an order. The persisted strings are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Formed,
    Completed,
    Rejected,
    Deleted,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Draft,
        OrderStatus::Formed,
        OrderStatus::Completed,
        OrderStatus::Rejected,
        OrderStatus::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Formed => "FORMED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Deleted => "DELETED",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rejected | OrderStatus::Deleted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Drone and battery parameters of an order. Nullable until formation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DroneParameters {
    /// kg
    pub drone_weight: Option<f64>,
    /// kg
    pub cargo_weight: Option<f64>,
    /// mAh
    pub battery_capacity: Option<f64>,
    /// V
    pub battery_voltage: Option<f64>,
    /// 0..1
    pub efficiency: Option<f64>,
    /// percent, 0..100
    pub battery_remaining: Option<f64>,
}

impl DroneParameters {
    fn fields(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("drone_weight", self.drone_weight),
            ("cargo_weight", self.cargo_weight),
            ("battery_capacity", self.battery_capacity),
            ("battery_voltage", self.battery_voltage),
            ("efficiency", self.efficiency),
            ("battery_remaining", self.battery_remaining),
        ]
    }

    /// First unset field, in declaration order.
    pub fn missing_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, value)| value.is_none())
            .map(|(name, _)| name)
    }

    pub fn apply(&mut self, patch: &ParametersPatch) {
        let pairs = [
            (&mut self.drone_weight, patch.drone_weight),
            (&mut self.cargo_weight, patch.cargo_weight),
            (&mut self.battery_capacity, patch.battery_capacity),
            (&mut self.battery_voltage, patch.battery_voltage),
            (&mut self.efficiency, patch.efficiency),
            (&mut self.battery_remaining, patch.battery_remaining),
        ];
        for (slot, value) in pairs {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

/// Partial update of drone parameters. Unset fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersPatch {
    pub drone_weight: Option<f64>,
    pub cargo_weight: Option<f64>,
    pub battery_capacity: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub efficiency: Option<f64>,
    pub battery_remaining: Option<f64>,
}

impl ParametersPatch {
    pub fn is_empty(&self) -> bool {
        self.as_parameters().fields().iter().all(|(_, value)| value.is_none())
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        for (field, value) in self.as_parameters().fields() {
            if let Some(value) = value {
                non_negative(field, value)?;
            }
        }
        Ok(())
    }

    fn as_parameters(&self) -> DroneParameters {
        DroneParameters {
            drone_weight: self.drone_weight,
            cargo_weight: self.cargo_weight,
            battery_capacity: self.battery_capacity,
            battery_voltage: self.battery_voltage,
            efficiency: self.efficiency,
            battery_remaining: self.battery_remaining,
        }
    }
}

/// One flight mode inside an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub service_id: Uuid,
    /// Catalog values, joined at load time
    pub service_name: String,
    pub power_multiplier: f64,

    pub wind_multiplier: f64,
    pub rain_multiplier: f64,
    /// Estimated minutes, set when the order is completed
    pub runtime: Option<i32>,
    pub description: Option<String>,
}

pub const DEFAULT_WEATHER_MULTIPLIER: f64 = 1.0;

/// Fields the creator may change on an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemPatch {
    pub wind_multiplier: Option<f64>,
    pub rain_multiplier: Option<f64>,
    pub description: Option<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.wind_multiplier.is_none() && self.rain_multiplier.is_none() && self.description.is_none()
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if let Some(value) = self.wind_multiplier {
            non_negative("wind_multiplier", value)?;
        }
        if let Some(value) = self.rain_multiplier {
            non_negative("rain_multiplier", value)?;
        }
        Ok(())
    }

    pub fn apply_to(&self, item: &mut OrderItem) {
        if let Some(value) = self.wind_multiplier {
            item.wind_multiplier = value;
        }
        if let Some(value) = self.rain_multiplier {
            item.rain_multiplier = value;
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
    }
}

/// Listing filter for submitted orders. Date bounds apply to the formation
/// timestamp and are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
}

/// The requester's current draft, as shown next to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub order_id: Option<Uuid>,
    pub item_count: usize,
}

fn non_negative(field: &'static str, value: f64) -> Result<(), OrderError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(OrderError::InvalidParameter { field, value })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

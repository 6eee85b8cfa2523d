//! Ordering core for drone battery runtime estimates.
//!
//! Users collect flight modes from the catalog into a draft order, fill in
//! drone and battery parameters and submit it. Staff complete the order,
//! which stamps an estimated flight time on every item, or reject it.

pub mod config;
pub mod domain;
pub mod eventing;
pub mod metrics;
pub mod store;
pub mod system;

pub use config::Config;
pub use system::DroneOrders;

use std::sync::Arc;

use chrono::Duration;

use crate::config::Config;
use crate::domain::catalog::{Catalog, ImageStore, InMemoryImageStore};
use crate::domain::order::OrderCommandHandler;
use crate::metrics::Metrics;
use crate::store::{InMemoryStore, OrderStore, PgStore, ServiceRepository};

// ============================================================================
// DroneOrders - wires the catalog and the order handler to their stores
// ============================================================================

pub struct DroneOrders {
    catalog: Catalog,
    orders: OrderCommandHandler,
    metrics: Arc<Metrics>,
}

impl DroneOrders {
    pub fn new(
        services: Arc<dyn ServiceRepository>,
        orders: Arc<dyn OrderStore>,
        images: Arc<dyn ImageStore>,
        delivery_lead: Duration,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        Ok(Self {
            catalog: Catalog::new(services, images),
            orders: OrderCommandHandler::new(orders, metrics.clone()).with_delivery_lead(delivery_lead),
            metrics,
        })
    }

    /// Everything in process memory.
    pub fn in_memory(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Arc::new(InMemoryImageStore::new(config.image_public_url.clone())),
            Duration::days(config.delivery_lead_days),
        )
    }

    /// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let Some(url) = config.database_url.as_deref() else {
            return Self::in_memory(config);
        };

        tracing::info!(max_connections = config.database_max_connections, "Connecting to Postgres");
        let store = PgStore::connect(url, config.database_max_connections).await?;
        store.migrate().await?;

        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store,
            Arc::new(InMemoryImageStore::new(config.image_public_url.clone())),
            Duration::days(config.delivery_lead_days),
        )
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn orders(&self) -> &OrderCommandHandler {
        &self.orders
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

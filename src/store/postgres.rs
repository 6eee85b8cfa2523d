use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::domain::catalog::{Service, ServiceFilter, ServicePatch};
use crate::domain::order::{OrderAggregate, OrderEvent, OrderItem};
use crate::eventing::EventEnvelope;
use super::records::{EventRecord, ItemRecord, OrderRecord};
use super::{OrderQuery, OrderStore, OrderTransaction, ServiceRepository, StoreError};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Concurrency guarantees come from the database:
// - partial unique index drone_orders_one_draft_per_creator + ON CONFLICT
//   DO NOTHING makes get-or-create race-free
// - UNIQUE (order_id, service_id) backs idempotent item insertion
// - every mutating operation locks its order row with SELECT ... FOR UPDATE
// - service writes touch only their own columns; image swaps lock the row
//   so the replaced key is the one actually overwritten
//
// ============================================================================

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const ORDER_COLUMNS: &str = "id, version, creator_id, moderator_id, status, created_at, \
     formed_at, completed_at, drone_weight, cargo_weight, battery_capacity, \
     battery_voltage, efficiency, battery_remaining";

const SERVICE_COLUMNS: &str = "id, name, description, image, power_multiplier, is_deleted";

const EVENT_COLUMNS: &str = "event_id, order_id, sequence_number, event_type, event_version, \
     event_data, correlation_id, user_id, created_at, metadata";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }
}

/// Escape LIKE wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unique_violation(error: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what()),
        _ => StoreError::Database(error),
    }
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>, StoreError> {
    let records: Vec<ItemRecord> = sqlx::query_as(
        "SELECT i.id, i.order_id, i.service_id, s.name AS service_name, s.power_multiplier, \
                i.wind_multiplier, i.rain_multiplier, i.runtime, i.description \
         FROM drone_order_items i \
         JOIN drone_services s ON s.id = i.service_id \
         WHERE i.order_id = ANY($1) \
         ORDER BY i.id",
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for record in records {
        by_order.entry(record.order_id).or_default().push(record.into_item());
    }
    Ok(by_order)
}

async fn assemble(
    conn: &mut PgConnection,
    records: Vec<OrderRecord>,
) -> Result<Vec<OrderAggregate>, StoreError> {
    let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
    let mut items = load_items(conn, &ids).await?;

    records
        .into_iter()
        .map(|record| {
            let order_items = items.remove(&record.id).unwrap_or_default();
            record.into_aggregate(order_items)
        })
        .collect()
}

async fn load_one(
    conn: &mut PgConnection,
    record: Option<OrderRecord>,
) -> Result<Option<OrderAggregate>, StoreError> {
    match record {
        Some(record) => Ok(assemble(conn, vec![record]).await?.pop()),
        None => Ok(None),
    }
}

async fn select_order(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> Result<Option<OrderAggregate>, StoreError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM drone_orders WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let record: Option<OrderRecord> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    load_one(conn, record).await
}

async fn select_draft(
    conn: &mut PgConnection,
    creator_id: Uuid,
    for_update: bool,
) -> Result<Option<OrderAggregate>, StoreError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM drone_orders WHERE creator_id = $1 AND status = 'DRAFT'{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let record: Option<OrderRecord> = sqlx::query_as(&sql)
        .bind(creator_id)
        .fetch_optional(&mut *conn)
        .await?;
    load_one(conn, record).await
}

#[async_trait]
impl ServiceRepository for PgStore {
    async fn list_services(&self, filter: &ServiceFilter) -> Result<Vec<Service>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SERVICE_COLUMNS} FROM drone_services WHERE NOT is_deleted"
        ));
        if let Some(term) = filter.term() {
            query
                .push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(term)));
        }
        query.push(" ORDER BY name, id");

        Ok(query.build_query_as::<Service>().fetch_all(&self.pool).await?)
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM drone_services WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn insert_service(&self, service: &Service) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO drone_services (id, name, description, image, power_multiplier, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(service.id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(&service.image)
        .bind(service.power_multiplier)
        .bind(service.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("service {} already exists", service.id)))?;
        Ok(())
    }

    async fn patch_service(&self, id: Uuid, patch: &ServicePatch) -> Result<Option<Service>, StoreError> {
        let sql = format!(
            "UPDATE drone_services \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 power_multiplier = COALESCE($4, power_multiplier) \
             WHERE id = $1 AND NOT is_deleted \
             RETURNING {SERVICE_COLUMNS}"
        );
        Ok(sqlx::query_as(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(patch.power_multiplier)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn replace_service_image(
        &self,
        id: Uuid,
        key: &str,
    ) -> Result<Option<(Service, Option<String>)>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut service) = lock_active_service(&mut tx, id).await? else {
            return Ok(None);
        };

        let previous = service.image.replace(key.to_string());
        sqlx::query("UPDATE drone_services SET image = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some((service, previous)))
    }

    async fn delete_service(&self, id: Uuid) -> Result<Option<(Service, Option<String>)>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut service) = lock_active_service(&mut tx, id).await? else {
            return Ok(None);
        };

        let previous = service.image.take();
        service.is_deleted = true;
        sqlx::query("UPDATE drone_services SET is_deleted = TRUE, image = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some((service, previous)))
    }
}

async fn lock_active_service(conn: &mut PgConnection, id: Uuid) -> Result<Option<Service>, StoreError> {
    let sql = format!(
        "SELECT {SERVICE_COLUMNS} FROM drone_services WHERE id = $1 AND NOT is_deleted FOR UPDATE"
    );
    Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgOrderTransaction { tx }))
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        select_order(&mut conn, id, false).await
    }

    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        select_draft(&mut conn, creator_id, false).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderAggregate>, StoreError> {
        let mut sql = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM drone_orders WHERE status NOT IN ('DRAFT', 'DELETED')"
        ));
        if let Some(creator_id) = query.creator_id {
            sql.push(" AND creator_id = ").push_bind(creator_id);
        }
        if let Some(status) = query.status {
            sql.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.date_from {
            sql.push(" AND formed_at >= ").push_bind(from);
        }
        if let Some(to) = query.date_to {
            sql.push(" AND formed_at <= ").push_bind(to);
        }
        sql.push(" ORDER BY formed_at, id");

        let mut conn = self.pool.acquire().await?;
        let records: Vec<OrderRecord> = sql.build_query_as().fetch_all(&mut *conn).await?;
        assemble(&mut conn, records).await
    }

    async fn load_events(&self, order_id: Uuid) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM drone_order_events WHERE order_id = $1 ORDER BY sequence_number"
        );
        let records: Vec<EventRecord> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        records.into_iter().map(EventRecord::into_envelope).collect()
    }
}

struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn find_service(&mut self, id: Uuid) -> Result<Option<Service>, StoreError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM drone_services WHERE id = $1");
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&mut *self.tx).await?)
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<OrderAggregate>, StoreError> {
        select_order(&mut self.tx, id, true).await
    }

    async fn order_id_for_item(&mut self, item_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let order_id: Option<Uuid> =
            sqlx::query_scalar("SELECT order_id FROM drone_order_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(order_id)
    }

    async fn get_or_create_draft(
        &mut self,
        candidate: &OrderAggregate,
    ) -> Result<(OrderAggregate, bool), StoreError> {
        // Blocks on a concurrent insert for the same creator until it settles
        let inserted = sqlx::query(
            "INSERT INTO drone_orders (id, version, creator_id, status, created_at) \
             VALUES ($1, $2, $3, 'DRAFT', $4) \
             ON CONFLICT (creator_id) WHERE status = 'DRAFT' DO NOTHING",
        )
        .bind(candidate.id)
        .bind(candidate.version)
        .bind(candidate.creator_id)
        .bind(candidate.created_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected()
            == 1;

        let draft = select_draft(&mut self.tx, candidate.creator_id, true)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!("no draft for creator {}", candidate.creator_id))
            })?;
        Ok((draft, inserted))
    }

    async fn save_order(&mut self, order: &OrderAggregate) -> Result<(), StoreError> {
        let record = OrderRecord::from_aggregate(order);
        let updated = sqlx::query(
            "UPDATE drone_orders SET \
                version = $2, moderator_id = $3, status = $4, formed_at = $5, completed_at = $6, \
                drone_weight = $7, cargo_weight = $8, battery_capacity = $9, \
                battery_voltage = $10, efficiency = $11, battery_remaining = $12 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.version)
        .bind(record.moderator_id)
        .bind(&record.status)
        .bind(record.formed_at)
        .bind(record.completed_at)
        .bind(record.drone_weight)
        .bind(record.cargo_weight)
        .bind(record.battery_capacity)
        .bind(record.battery_voltage)
        .bind(record.efficiency)
        .bind(record.battery_remaining)
        .execute(&mut *self.tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("order {} was never inserted", order.id)));
        }

        let kept: Vec<Uuid> = order.items.iter().map(|item| item.id).collect();
        sqlx::query("DELETE FROM drone_order_items WHERE order_id = $1 AND NOT (id = ANY($2))")
            .bind(order.id)
            .bind(&kept)
            .execute(&mut *self.tx)
            .await?;

        for item in &order.items {
            let row = ItemRecord::from_item(order.id, item);
            sqlx::query(
                "INSERT INTO drone_order_items \
                    (id, order_id, service_id, wind_multiplier, rain_multiplier, runtime, description) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET \
                    wind_multiplier = EXCLUDED.wind_multiplier, \
                    rain_multiplier = EXCLUDED.rain_multiplier, \
                    runtime = EXCLUDED.runtime, \
                    description = EXCLUDED.description",
            )
            .bind(row.id)
            .bind(row.order_id)
            .bind(row.service_id)
            .bind(row.wind_multiplier)
            .bind(row.rain_multiplier)
            .bind(row.runtime)
            .bind(&row.description)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                unique_violation(e, || {
                    format!("service {} appears twice in order {}", row.service_id, order.id)
                })
            })?;
        }

        Ok(())
    }

    async fn append_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError> {
        for envelope in events {
            let record = EventRecord::from_envelope(envelope)?;
            sqlx::query(
                "INSERT INTO drone_order_events \
                    (event_id, order_id, sequence_number, event_type, event_version, \
                     event_data, correlation_id, user_id, created_at, metadata) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(record.event_id)
            .bind(record.order_id)
            .bind(record.sequence_number)
            .bind(&record.event_type)
            .bind(record.event_version)
            .bind(&record.event_data)
            .bind(record.correlation_id)
            .bind(record.user_id)
            .bind(record.created_at)
            .bind(&record.metadata)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                unique_violation(e, || {
                    format!(
                        "event {} of order {} already recorded",
                        record.sequence_number, record.order_id
                    )
                })
            })?;
        }

        tracing::debug!(event_count = events.len(), "Appended order events to audit log");
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries against a live database are exercised through the same
// OrderStore contract as InMemoryStore; these tests cover the pure helpers.
//
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("hover"), "hover");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_schema_enforces_single_draft_per_creator() {
        assert!(SCHEMA.contains("drone_orders_one_draft_per_creator"));
        assert!(SCHEMA.contains("WHERE status = 'DRAFT'"));
        assert!(SCHEMA.contains("UNIQUE (order_id, service_id)"));
    }

    #[test]
    fn test_order_columns_match_record() {
        // FromRow maps by name; every OrderRecord field must be selected
        for column in [
            "id", "version", "creator_id", "moderator_id", "status", "created_at",
            "formed_at", "completed_at", "drone_weight", "cargo_weight",
            "battery_capacity", "battery_voltage", "efficiency", "battery_remaining",
        ] {
            assert!(
                ORDER_COLUMNS.split(',').any(|c| c.trim() == column),
                "missing column {column}"
            );
        }
    }
}

use futures_util::future::try_join_all;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use drone_battery_orders::domain::catalog::NewService;
use drone_battery_orders::domain::order::ParametersPatch;
use drone_battery_orders::domain::Requester;
use drone_battery_orders::{Config, DroneOrders};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, crate at DEBUG; override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,drone_battery_orders=debug")),
        )
        .init();

    tracing::info!("Starting drone battery orders demo");

    let config = Config::load()?;
    let system = DroneOrders::from_config(&config).await?;

    // === 1. Seed the catalog ===
    let moderator = Requester::staff(Uuid::new_v4());
    let mut services = Vec::new();
    for (name, description, power_multiplier) in [
        ("Hovering", "Holding a fixed position", 0.6),
        ("Active manoeuvring", "Continuous changes of course and altitude", 1.0),
        ("Video recording", "Flight with the camera gimbal powered", 1.2),
    ] {
        let service = system
            .catalog()
            .create_service(
                moderator,
                NewService {
                    name: name.to_string(),
                    description: description.to_string(),
                    power_multiplier,
                },
            )
            .await?;
        services.push(service);
    }

    // === 2. Build a draft; concurrent adds share one draft ===
    let pilot = Requester::user(Uuid::new_v4());
    let added = try_join_all(
        services
            .iter()
            .map(|service| system.orders().add_service_to_draft(pilot, service.id)),
    )
    .await?;

    let order_id = added[0].0;
    tracing::info!(%order_id, items = added.len(), "Draft filled");

    let summary = system.orders().draft_summary(pilot).await?;
    tracing::info!(order_id = ?summary.order_id, items = summary.item_count, "Draft summary");

    // === 3. Parameters and submission ===
    system
        .orders()
        .set_parameters(
            pilot,
            order_id,
            ParametersPatch {
                drone_weight: Some(2.0),
                cargo_weight: Some(1.0),
                battery_capacity: Some(5000.0),
                battery_voltage: Some(11.1),
                efficiency: Some(0.8),
                battery_remaining: Some(85.0),
            },
        )
        .await?;
    system.orders().form_order(pilot, order_id).await?;

    // === 4. Moderation ===
    let completion = system.orders().complete_order(moderator, order_id).await?;
    for item in &completion.order.items {
        tracing::info!(
            service = %item.service_name,
            runtime_minutes = ?item.runtime,
            "Estimated flight time"
        );
    }
    tracing::info!(delivery_date = %completion.delivery_date, "Order completed");

    let history = system.orders().order_history(pilot, order_id).await?;
    tracing::info!(events = history.len(), "Audit log written");

    tracing::debug!("Metrics:\n{}", system.metrics().render()?);
    tracing::info!("Demo complete");

    Ok(())
}

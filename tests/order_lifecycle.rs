use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use uuid::Uuid;

use drone_battery_orders::domain::catalog::{NewService, Service, ServiceFilter};
use drone_battery_orders::domain::order::{
    ItemPatch, OrderError, OrderFilter, OrderStatus, ParametersPatch,
};
use drone_battery_orders::domain::{ErrorKind, Requester};
use drone_battery_orders::{Config, DroneOrders};

fn system() -> DroneOrders {
    let config = Config::from_lookup(|_| None).unwrap();
    DroneOrders::in_memory(&config).unwrap()
}

fn moderator() -> Requester {
    Requester::staff(Uuid::from_u128(0xA11CE))
}

fn parameters() -> ParametersPatch {
    ParametersPatch {
        drone_weight: Some(2.0),
        cargo_weight: Some(1.0),
        battery_capacity: Some(5000.0),
        battery_voltage: Some(11.1),
        efficiency: Some(0.8),
        battery_remaining: Some(85.0),
    }
}

async fn seed(system: &DroneOrders, name: &str, power_multiplier: f64) -> Service {
    system
        .catalog()
        .create_service(
            moderator(),
            NewService {
                name: name.to_string(),
                description: String::new(),
                power_multiplier,
            },
        )
        .await
        .unwrap()
}

/// A formed order with the given services, owned by `pilot`.
async fn formed_order(system: &DroneOrders, pilot: Requester, services: &[&Service]) -> Uuid {
    let draft = system.orders().get_or_create_draft(pilot).await.unwrap();
    for service in services {
        system.orders().add_item(pilot, draft.id, service.id).await.unwrap();
    }
    system.orders().set_parameters(pilot, draft.id, parameters()).await.unwrap();
    system.orders().form_order(pilot, draft.id).await.unwrap();
    draft.id
}

#[tokio::test]
async fn test_full_lifecycle_stamps_runtimes() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let manoeuvring = seed(&system, "Active manoeuvring", 1.0).await;
    let video = seed(&system, "Video recording", 1.2).await;

    let order_id = formed_order(&system, pilot, &[&hovering, &manoeuvring, &video]).await;
    let formed = system.orders().get_order(pilot, order_id).await.unwrap();
    assert_eq!(formed.status, OrderStatus::Formed);
    assert!(formed.formed_at.is_some());
    assert!(formed.items.iter().all(|item| item.runtime.is_none()));

    let completion = system.orders().complete_order(moderator(), order_id).await.unwrap();
    let order = completion.order;

    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.moderator_id, Some(moderator().user_id));
    let runtime = |service: &Service| order.item_for_service(service.id).unwrap().runtime;
    assert_eq!(runtime(&manoeuvring), Some(436));
    assert_eq!(runtime(&video), Some(363));
    assert_eq!(runtime(&hovering), Some(726));
    assert_eq!(completion.delivery_date, order.completed_at.unwrap() + Duration::days(30));
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_draft() {
    let system = Arc::new(system());
    let pilot = Requester::user(Uuid::new_v4());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let system = system.clone();
            tokio::spawn(async move { system.orders().get_or_create_draft(pilot).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let history = system.orders().order_history(pilot, ids[0]).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completions_are_serialised() {
    let system = Arc::new(system());
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let order_id = formed_order(&system, pilot, &[&hovering]).await;

    let handles: Vec<_> = (0..8u128)
        .map(|n| {
            let system = system.clone();
            let moderator = Requester::staff(Uuid::from_u128(0xB0B0 + n));
            tokio::spawn(async move { system.orders().complete_order(moderator, order_id).await })
        })
        .collect();

    let mut completions = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(completion) => completions.push(completion),
            Err(err) => assert!(matches!(
                err,
                OrderError::InvalidTransition { status: OrderStatus::Completed, .. }
            )),
        }
    }
    assert_eq!(completions.len(), 1);

    let winner = completions[0].order.moderator_id;
    let order = system.orders().get_order(pilot, order_id).await.unwrap();
    assert_eq!(order.moderator_id, winner);
    assert_eq!(order.items[0].runtime, Some(726));

    let history = system.orders().order_history(pilot, order_id).await.unwrap();
    let completed = history.iter().filter(|e| e.event_type == "OrderCompleted").count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_concurrent_adds_of_one_service_keep_one_item() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;

    let results = join_all(
        (0..8).map(|_| system.orders().add_service_to_draft(pilot, hovering.id)),
    )
    .await;

    let items: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert!(items.iter().all(|(order_id, item)| {
        *order_id == items[0].0 && item.id == items[0].1.id
    }));

    let summary = system.orders().draft_summary(pilot).await.unwrap();
    assert_eq!(summary.order_id, Some(items[0].0));
    assert_eq!(summary.item_count, 1);
}

#[tokio::test]
async fn test_form_with_missing_parameter_fails() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let draft = system.orders().get_or_create_draft(pilot).await.unwrap();

    let mut patch = parameters();
    patch.battery_voltage = None;
    system.orders().set_parameters(pilot, draft.id, patch).await.unwrap();

    let err = system.orders().form_order(pilot, draft.id).await.unwrap_err();
    assert!(matches!(err, OrderError::IncompleteParameters("battery_voltage")));
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let order = system.orders().get_order(pilot, draft.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
}

#[tokio::test]
async fn test_complete_of_draft_is_rejected() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let (order_id, _) = system.orders().add_service_to_draft(pilot, hovering.id).await.unwrap();

    let err = system.orders().complete_order(moderator(), order_id).await.unwrap_err();

    assert!(matches!(err, OrderError::InvalidTransition { status: OrderStatus::Draft, .. }));
    let order = system.orders().get_order(pilot, order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Draft);
    assert!(order.items[0].runtime.is_none());
}

#[tokio::test]
async fn test_reject_leaves_runtimes_null() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let order_id = formed_order(&system, pilot, &[&hovering]).await;

    let order = system.orders().reject_order(moderator(), order_id).await.unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.completed_at.is_some());
    assert!(order.items.iter().all(|item| item.runtime.is_none()));

    let again = system.orders().complete_order(moderator(), order_id).await;
    assert!(matches!(again, Err(OrderError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_pilot_cannot_moderate() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let order_id = formed_order(&system, pilot, &[]).await;

    let err = system.orders().complete_order(pilot, order_id).await.unwrap_err();
    assert_eq!(err.kind().status_code(), 403);
}

#[tokio::test]
async fn test_soft_delete_hides_draft_everywhere() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let (order_id, _) = system.orders().add_service_to_draft(pilot, hovering.id).await.unwrap();

    let deleted = system.orders().soft_delete_order(pilot, order_id).await.unwrap();
    assert_eq!(deleted.status, OrderStatus::Deleted);

    let summary = system.orders().draft_summary(pilot).await.unwrap();
    assert_eq!(summary.order_id, None);
    let listed = system.orders().list_orders(moderator(), &OrderFilter::default()).await.unwrap();
    assert!(listed.is_empty());
    let err = system.orders().get_order(pilot, order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = system.orders().add_item(pilot, order_id, hovering.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = system.orders().set_parameters(pilot, order_id, parameters()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_orders_filters_and_scopes() {
    let system = system();
    let alice = Requester::user(Uuid::new_v4());
    let bob = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;

    let first = formed_order(&system, alice, &[&hovering]).await;
    let second = formed_order(&system, bob, &[&hovering]).await;
    system.orders().complete_order(moderator(), second).await.unwrap();
    // Alice's fresh draft never shows up
    system.orders().get_or_create_draft(alice).await.unwrap();

    let everything = system.orders().list_orders(moderator(), &OrderFilter::default()).await.unwrap();
    let ids: Vec<_> = everything.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![first, second]);

    let own = system.orders().list_orders(alice, &OrderFilter::default()).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, first);

    let completed = OrderFilter { status: Some(OrderStatus::Completed), ..Default::default() };
    let listed = system.orders().list_orders(moderator(), &completed).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second);

    let formed_at = everything[0].formed_at.unwrap();
    let exact = OrderFilter {
        date_from: Some(formed_at),
        date_to: Some(formed_at),
        status: None,
    };
    let listed = system.orders().list_orders(moderator(), &exact).await.unwrap();
    assert!(listed.iter().any(|order| order.id == first));

    let future = OrderFilter { date_from: Some(Utc::now() + Duration::days(1)), ..Default::default() };
    assert!(system.orders().list_orders(moderator(), &future).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_service_cannot_be_ordered_but_old_items_survive() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let hovering = seed(&system, "Hovering", 0.6).await;
    let (order_id, item) = system.orders().add_service_to_draft(pilot, hovering.id).await.unwrap();

    system.catalog().soft_delete_service(moderator(), hovering.id).await.unwrap();

    let other = Requester::user(Uuid::new_v4());
    let err = system.orders().add_service_to_draft(other, hovering.id).await.unwrap_err();
    assert!(matches!(err, OrderError::ServiceNotFound(_)));

    let order = system.orders().get_order(pilot, order_id).await.unwrap();
    assert_eq!(order.items[0].id, item.id);
    assert_eq!(order.items[0].service_name, "Hovering");

    let services = system.catalog().list_services(&ServiceFilter::default()).await.unwrap();
    assert!(services.is_empty());
}

#[tokio::test]
async fn test_weather_multipliers_raise_the_power_draw() {
    let system = system();
    let pilot = Requester::user(Uuid::new_v4());
    let manoeuvring = seed(&system, "Active manoeuvring", 1.0).await;
    let (order_id, item) = system
        .orders()
        .add_service_to_draft(pilot, manoeuvring.id)
        .await
        .unwrap();

    let patch = ItemPatch {
        wind_multiplier: Some(1.5),
        rain_multiplier: Some(1.2),
        description: Some("Coastal survey".to_string()),
    };
    system.orders().update_item(pilot, item.id, patch).await.unwrap();
    system.orders().set_parameters(pilot, order_id, parameters()).await.unwrap();
    system.orders().form_order(pilot, order_id).await.unwrap();

    let completion = system.orders().complete_order(moderator(), order_id).await.unwrap();
    let item = &completion.order.items[0];
    // 436 minutes in calm weather, divided by 1.5 * 1.2
    assert_eq!(item.runtime, Some(242));
    assert_eq!(item.description.as_deref(), Some("Coastal survey"));
}

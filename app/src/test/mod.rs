//! Guarded with `#[cfg(test)]` from `lib.rs`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use actix_web::http::StatusCode;
use actix_web::{test as actix_test, App};
use anyhow::Result;
use maplit::hashmap;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use infra::ids::Id;

use crate::catalog::{Product, ProductCategory, Restaurant};
use crate::locations::{Coordinates, GeocodeError, Geocoder};
use crate::orders::{OrderOutcome, OrderPayload, OrderStatus, RegistrationStatus};
use crate::FoodCart;


use self::memory::MemoryManager;

const PHONE: &str = "+16502530000";

#[derive(Debug, Clone, Copy)]
enum Reply {
    Found(Coordinates),
    Unknown,
    Down,
}

/// Counts lookups and answers every address the same way.
#[derive(Debug)]
struct StubGeocoder {
    reply: Reply,
    calls: AtomicUsize,
}

impl StubGeocoder {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(StubGeocoder {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for StubGeocoder {
    fn fetch_coordinates(&self, _: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Found(c) => Ok(Some(c)),
            Reply::Unknown => Ok(None),
            Reply::Down => Err(GeocodeError::Status(503)),
        }
    }
}

struct Seeded {
    burgers: Id<ProductCategory>,
    burger: Id<Product>,
    fries: Id<Product>,
    hidden: Id<Product>,
    kitchen: Id<Restaurant>,
}

struct Scenario {
    store: MemoryManager,
    geocoder: Arc<StubGeocoder>,
    app: FoodCart<MemoryManager>,
}

impl Scenario {
    fn new(reply: Reply) -> Self {
        env_logger::try_init().unwrap_or_default();
        let store = MemoryManager::default();
        let geocoder = StubGeocoder::new(reply);
        let app = FoodCart::from_parts(store.pool(), geocoder.clone());
        Scenario {
            store,
            geocoder,
            app,
        }
    }

    fn moscow() -> Self {
        Self::new(Reply::Found(Coordinates {
            lat: 55.7558,
            lon: 37.6173,
        }))
    }

    fn seed(&self) -> Seeded {
        let mut t = self.store.tables();
        let burgers = t.add_category("Burgers");
        let burger = t.add_product("Burger", Some(burgers), Decimal::new(35000, 2), true);
        let fries = t.add_product("Fries", None, Decimal::new(12050, 2), true);
        let hidden = t.add_product("Seasonal", Some(burgers), Decimal::new(50000, 2), false);
        let kitchen = t.add_restaurant("Kitchen");
        let corner = t.add_restaurant("Corner");
        t.add_menu_item(corner, burger, true);
        t.add_menu_item(kitchen, burger, true);
        t.add_menu_item(kitchen, fries, false);
        Seeded {
            burgers,
            burger,
            fries,
            hidden,
            kitchen,
        }
    }

    fn order_count(&self) -> usize {
        self.store.tables().orders.len()
    }

    fn item_count(&self) -> usize {
        self.store.tables().order_items.len()
    }

    fn location_count(&self) -> usize {
        self.store.tables().locations.len()
    }
}

fn payload(products: Value) -> OrderPayload {
    serde_json::from_value(json!({
        "firstname": "Ivan",
        "lastname": "Petrov",
        "phonenumber": PHONE,
        "address": "Moscow, Tverskaya 1",
        "products": products,
    }))
    .expect("payload")
}

#[test]
fn products_list_only_available_ones_with_first_restaurant() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    let products = sc.app.catalog().list_available_products()?;
    let ids = products.iter().map(|p| p.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![cat.burger, cat.fries]);

    let burger = &products[0];
    assert_eq!(burger.category.as_ref().map(|c| c.id), Some(cat.burgers));
    let restaurant = burger.restaurant.as_ref().expect("burger restaurant");
    assert_eq!(restaurant.id, cat.kitchen);

    let fries = &products[1];
    assert_eq!(fries.category, None);
    assert_eq!(fries.restaurant, None);
    assert!(!ids.contains(&cat.hidden));
    Ok(())
}

#[test]
fn readiness_reports_missing_data_and_has_no_side_effects() -> Result<()> {
    let sc = Scenario::moscow();
    let empty = sc.app.catalog().check_readiness()?;
    assert!(!empty.ready);
    assert_eq!(empty.errors.len(), 4);

    sc.seed();
    let first = sc.app.catalog().check_readiness()?;
    let second = sc.app.catalog().check_readiness()?;
    assert!(first.ready, "{:?}", first);
    assert_eq!(first, second);
    assert_eq!(first.counts.total_products, 3);
    assert_eq!(first.counts.available_products, 2);
    assert_eq!(first.counts.restaurants_with_menu, 2);
    assert_eq!(sc.order_count(), 0);
    Ok(())
}

#[test]
fn valid_order_is_stored_with_current_prices() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    let outcome = sc.app.orders().register_order(&payload(json!([
        {"product": cat.burger.value(), "quantity": 2},
        {"product": cat.fries.value(), "quantity": 1},
    ])))?;
    let receipt = match outcome {
        OrderOutcome::Registered(receipt) => receipt,
        other => panic!("expected registration, got {:?}", other),
    };
    assert_eq!(receipt.status(), RegistrationStatus::Success);
    assert!(receipt.missing_products.is_empty());
    assert_eq!(receipt.customer.phonenumber, PHONE);

    let (order, items) = sc
        .app
        .orders()
        .show_order(receipt.order_id)?
        .expect("stored order");
    assert_eq!(order.status, OrderStatus::Unprocessed);
    assert_eq!(order.firstname, "Ivan");
    let prices = items
        .iter()
        .map(|i| (i.product, i.quantity, i.price))
        .collect::<Vec<_>>();
    assert_eq!(
        prices,
        vec![
            (cat.burger, 2, Decimal::new(35000, 2)),
            (cat.fries, 1, Decimal::new(12050, 2)),
        ]
    );
    Ok(())
}

#[test]
fn invalid_order_writes_nothing() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    let mut bad = payload(json!([{"product": cat.burger.value(), "quantity": 0}]));
    bad.firstname = Value::Null;
    let errors = match sc.app.orders().register_order(&bad)? {
        OrderOutcome::Rejected(errors) => errors,
        other => panic!("expected rejection, got {:?}", other),
    };
    assert_eq!(
        errors.messages(),
        &[
            "firstname: this field is required".to_string(),
            "products[0].quantity: expected an integer from 1 to 100".to_string(),
        ]
    );
    assert_eq!(sc.order_count(), 0);
    assert_eq!(sc.location_count(), 0);
    assert_eq!(sc.geocoder.calls(), 0);
    Ok(())
}

#[test]
fn unknown_products_are_reported_but_do_not_block_the_order() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    let outcome = sc.app.orders().register_order(&payload(json!([
        {"product": cat.burger.value(), "quantity": 1},
        {"product": 9999, "quantity": 3},
    ])))?;
    let receipt = match outcome {
        OrderOutcome::Registered(receipt) => receipt,
        other => panic!("expected registration, got {:?}", other),
    };
    assert_eq!(receipt.status(), RegistrationStatus::PartialSuccess);
    assert_eq!(receipt.missing_products, vec![Id::new(9999)]);
    assert_eq!(receipt.added_products.len(), 1);
    assert_eq!(sc.order_count(), 1);
    assert_eq!(sc.item_count(), 1);
    Ok(())
}

#[test]
fn order_of_only_unknown_products_is_dropped() -> Result<()> {
    let sc = Scenario::moscow();
    sc.seed();

    let outcome = sc
        .app
        .orders()
        .register_order(&payload(json!([{"product": 9999, "quantity": 1}])))?;
    assert!(
        matches!(outcome, OrderOutcome::Rejected(_)),
        "{:?}",
        outcome
    );
    assert_eq!(sc.order_count(), 0);
    assert_eq!(sc.item_count(), 0);
    Ok(())
}

#[test]
fn failed_item_write_rolls_back_the_order() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();
    sc.store.fail_item_inserts(true);

    let res = sc
        .app
        .orders()
        .register_order(&payload(json!([{"product": cat.burger.value(), "quantity": 1}])));
    assert!(res.is_err(), "{:?}", res);
    assert_eq!(sc.order_count(), 0);
    assert_eq!(sc.item_count(), 0);
    assert_eq!(sc.location_count(), 0);

    sc.store.fail_item_inserts(false);
    let outcome = sc
        .app
        .orders()
        .register_order(&payload(json!([{"product": cat.burger.value(), "quantity": 1}])))?;
    assert!(matches!(outcome, OrderOutcome::Registered(_)));
    assert_eq!(sc.order_count(), 1);
    Ok(())
}

#[test]
fn registered_order_caches_its_address() -> Result<()> {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    for _ in 0..2 {
        sc.app
            .orders()
            .register_order(&payload(json!([{"product": cat.burger.value(), "quantity": 1}])))?;
    }
    assert_eq!(sc.order_count(), 2);
    assert_eq!(sc.location_count(), 1);
    assert_eq!(sc.geocoder.calls(), 1);
    Ok(())
}

#[test]
fn geocoder_outage_does_not_fail_the_order() -> Result<()> {
    let sc = Scenario::new(Reply::Down);
    let cat = sc.seed();

    let outcome = sc
        .app
        .orders()
        .register_order(&payload(json!([{"product": cat.burger.value(), "quantity": 1}])))?;
    assert!(matches!(outcome, OrderOutcome::Registered(_)));

    let tables = sc.store.tables();
    let location = &tables.locations[0];
    assert_eq!(location.coordinates(), None);
    assert!(location.last_geocode_attempt.is_some());
    Ok(())
}

#[test]
fn resolving_twice_calls_the_geocoder_once() -> Result<()> {
    let sc = Scenario::moscow();

    let first = sc.app.locations().resolve("Moscow, Red Square")?.expect("first");
    let second = sc
        .app
        .locations()
        .resolve("  Moscow, Red Square ")?
        .expect("second");
    assert_eq!(first.id, second.id);
    assert_eq!(
        second.coordinates(),
        Some(Coordinates {
            lat: 55.7558,
            lon: 37.6173
        })
    );
    assert_eq!(sc.geocoder.calls(), 1);
    Ok(())
}

#[test]
fn concurrent_resolves_share_one_location() -> Result<()> {
    let sc = Scenario::moscow();

    let handles = (0..8)
        .map(|_| {
            let locations = sc.app.locations().clone();
            thread::spawn(move || locations.resolve("Moscow, Arbat 10"))
        })
        .collect::<Vec<_>>();
    let mut ids = Vec::new();
    for handle in handles {
        let location = handle.join().expect("join")?.expect("location");
        ids.push(location.id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "{:?}", ids);
    assert_eq!(sc.location_count(), 1);
    assert_eq!(sc.geocoder.calls(), 1);
    Ok(())
}

#[test]
fn blank_addresses_are_ignored() -> Result<()> {
    let sc = Scenario::moscow();

    assert_eq!(sc.app.locations().resolve("")?, None);
    assert_eq!(sc.app.locations().resolve("   ")?, None);
    let resolved = sc
        .app
        .locations()
        .resolve_all(vec!["", "Moscow, Arbat 10", "  ", "Moscow, Arbat 12"])?;
    let addresses = resolved.iter().map(|l| l.address.as_str()).collect::<Vec<_>>();
    assert_eq!(addresses, vec!["Moscow, Arbat 10", "Moscow, Arbat 12"]);
    assert_eq!(sc.geocoder.calls(), 2);
    Ok(())
}

#[test]
fn unknown_address_is_not_retried() -> Result<()> {
    let sc = Scenario::new(Reply::Unknown);

    let first = sc.app.locations().resolve("Nowhere 1")?.expect("first");
    assert_eq!(first.coordinates(), None);
    assert!(first.last_geocode_attempt.is_some());

    sc.app.locations().resolve("Nowhere 1")?;
    assert_eq!(sc.geocoder.calls(), 1);
    Ok(())
}

async fn call(sc: &Scenario, req: actix_test::TestRequest) -> (StatusCode, Value) {
    let app = sc.app.clone();
    let srv = actix_test::init_service(App::new().configure(move |cfg| app.configure(cfg))).await;
    let resp = actix_test::call_service(&srv, req.to_request()).await;
    let status = resp.status();
    let body = actix_test::read_body(resp).await;
    let value = serde_json::from_slice(&body).expect("json body");
    (status, value)
}

#[actix_web::test]
async fn http_product_list() {
    let sc = Scenario::moscow();
    let cat = sc.seed();

    let (status, body) = call(&sc, actix_test::TestRequest::get().uri("/api/products/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], json!(cat.burger.value()));
    assert_eq!(body[0]["price"], json!("350.00"));
    assert_eq!(
        body[0]["category"],
        json!({"id": cat.burgers.value(), "name": "Burgers"})
    );
    assert_eq!(
        body[0]["restaurant"],
        json!({"id": cat.kitchen.value(), "name": "Kitchen"})
    );
    assert_eq!(body[1]["restaurant"], Value::Null);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn http_readiness() {
    let sc = Scenario::moscow();
    let (status, body) = call(&sc, actix_test::TestRequest::get().uri("/api/order/")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], json!("error"));

    sc.seed();
    let (status, body) = call(&sc, actix_test::TestRequest::get().uri("/api/order/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ready"));
    assert_eq!(body["database_status"]["total_restaurants"], json!(2));
    assert_eq!(body.get("errors"), None);
}

#[actix_web::test]
async fn http_order_statuses() {
    let sc = Scenario::moscow();
    let cat = sc.seed();
    let base = hashmap! {
        "firstname" => json!("Ivan"),
        "lastname" => json!("Petrov"),
        "phonenumber" => json!(PHONE),
        "address" => json!("Moscow, Tverskaya 1"),
    };

    let mut full = base.clone();
    full.insert(
        "products",
        json!([{"product": cat.burger.value(), "quantity": 2}]),
    );
    let (status, body) = call(
        &sc,
        actix_test::TestRequest::post().uri("/api/order/").set_json(&full),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["added_products"][0]["quantity"], json!(2));
    assert_eq!(body.get("missing_products"), None);

    let mut partial = base.clone();
    partial.insert(
        "products",
        json!([
            {"product": cat.burger.value(), "quantity": 1},
            {"product": 9999, "quantity": 1},
        ]),
    );
    let (status, body) = call(
        &sc,
        actix_test::TestRequest::post().uri("/api/order/").set_json(&partial),
    )
    .await;
    assert_eq!(status, StatusCode::MULTI_STATUS, "{}", body);
    assert_eq!(body["status"], json!("partial_success"));
    assert_eq!(body["missing_products"], json!([9999]));

    let mut invalid = base;
    invalid.insert("phonenumber", json!("12345"));
    invalid.insert("products", json!([]));
    let (status, body) = call(
        &sc,
        actix_test::TestRequest::post().uri("/api/order/").set_json(&invalid),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        json!([
            "phonenumber: not a valid international phone number",
            "products: this list may not be empty",
        ])
    );
    assert_eq!(sc.order_count(), 2);
}

#[actix_web::test]
async fn http_malformed_body_is_a_validation_error() {
    let sc = Scenario::moscow();
    let req = actix_test::TestRequest::post()
        .uri("/api/order/")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"firstname\": ");
    let (status, body) = call(&sc, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Order data is invalid"));
    assert_eq!(sc.order_count(), 0);
}

#[actix_web::test]
async fn http_internal_failure() {
    let sc = Scenario::moscow();
    let cat = sc.seed();
    sc.store.fail_item_inserts(true);

    let order = json!({
        "firstname": "Ivan",
        "lastname": "Petrov",
        "phonenumber": PHONE,
        "address": "Moscow, Tverskaya 1",
        "products": [{"product": cat.burger.value(), "quantity": 1}],
    });
    let (status, body) = call(
        &sc,
        actix_test::TestRequest::post().uri("/api/order/").set_json(&order),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
    assert_eq!(body["status"], json!("error"));
    assert_eq!(body["message"], json!("Internal server error"));
    assert!(body["error"].is_string(), "{}", body);
    assert_eq!(body.get("errors"), None);
    assert_eq!(sc.order_count(), 0);
    assert_eq!(sc.item_count(), 0);
}

#[actix_web::test]
async fn http_banners() {
    let sc = Scenario::moscow();
    let (status, body) = call(&sc, actix_test::TestRequest::get().uri("/api/banners/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], json!("Burger"));
    assert_eq!(body.as_array().map(Vec::len), Some(3));
}

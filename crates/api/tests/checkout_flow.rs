//! Black-box HTTP tests over the in-memory deployment.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use modushop_outbox::DispatcherConfig;

struct TestServer {
    base_url: String,
    server: tokio::task::JoinHandle<()>,
    dispatcher: Option<modushop_outbox::DispatcherHandle>,
}

impl TestServer {
    /// Same router as prod, in-memory stores, fast outbox polling, ephemeral
    /// port.
    async fn spawn() -> Self {
        let config = DispatcherConfig::default().with_poll_interval(Duration::from_millis(20));
        let (services, dispatcher) = modushop_api::app::services::build_in_memory(config);
        let app = modushop_api::app::build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            server,
            dispatcher: Some(dispatcher),
        }
    }

    async fn shutdown(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown().await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn basket_body(user: &str) -> serde_json::Value {
    json!({
        "user_name": user,
        "items": [
            { "product_id": uuid::Uuid::now_v7(), "product_name": "cable",
              "color": "black", "quantity": 3, "unit_price": "10.00" }
        ]
    })
}

fn checkout_body(user: &str) -> serde_json::Value {
    json!({
        "user_name": user,
        "customer_id": uuid::Uuid::now_v7(),
        "first_name": "Alice",
        "last_name": "Smith",
        "email_address": "alice@example.com",
        "address_line": "1 Main St",
        "country": "US",
        "state": "WA",
        "zip_code": "98101",
        "card_name": "Alice Smith",
        "card_number": "4111111111111111",
        "expiration": "12/27",
        "cvv": "123",
        "payment_method": 1
    })
}

async fn orders_eventually(
    client: &reqwest::Client,
    base_url: &str,
    user: &str,
) -> Vec<serde_json::Value> {
    // Checkout commits an outbox row; the order shows up once the dispatcher
    // has run a cycle. Poll briefly.
    for _ in 0..100 {
        let orders: Vec<serde_json::Value> = client
            .get(format!("{base_url}/orders?user_name={user}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !orders.is_empty() {
            return orders;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("order did not appear within timeout");
}

#[tokio::test]
async fn checkout_produces_exactly_one_order() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/basket", server.base_url))
        .json(&basket_body("alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/basket/checkout", server.base_url))
        .json(&checkout_body("alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["total_price"], "30.00");

    // The cart is gone the moment checkout returns.
    let res = client
        .get(format!("{}/basket/alice", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let orders = orders_eventually(&client, &server.base_url, "alice").await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["total_price"], "30.00");
    assert_eq!(orders[0]["items"][0]["quantity"], 3);

    // A few more dispatcher cycles later there is still exactly one order.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let orders: Vec<serde_json::Value> = client
        .get(format!("{}/orders?user_name=alice", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn checkout_of_missing_or_empty_basket_is_not_found() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/basket/checkout", server.base_url))
        .json(&checkout_body("nobody"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // An existing but empty basket is rejected the same way.
    let res = client
        .post(format!("{}/basket", server.base_url))
        .json(&json!({ "user_name": "bob", "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/basket/checkout", server.base_url))
        .json(&checkout_body("bob"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown().await;
}

#[tokio::test]
async fn checkout_validation_reports_field_errors() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/basket", server.base_url))
        .json(&basket_body("carol"))
        .send()
        .await
        .unwrap();

    let mut body = checkout_body("carol");
    body["card_number"] = json!("");
    body["cvv"] = json!("");

    let res = client
        .post(format!("{}/basket/checkout", server.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let problem: serde_json::Value = res.json().await.unwrap();
    assert_eq!(problem["title"], "validation_failure");
    assert!(problem["trace_id"].is_string());
    let fields: Vec<&str> = problem["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["card_number", "cvv"]);

    // The cart survived the rejected checkout.
    let res = client
        .get(format!("{}/basket/carol", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.shutdown().await;
}

#[tokio::test]
async fn products_can_be_listed_by_category_and_deleted() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let create = |name: &str, category: &str| {
        json!({ "name": name, "categories": [category], "price": "10.00" })
    };
    let keyboard: serde_json::Value = client
        .post(format!("{}/products", server.base_url))
        .json(&create("keyboard", "peripherals"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    client
        .post(format!("{}/products", server.base_url))
        .json(&create("monitor", "displays"))
        .send()
        .await
        .unwrap();

    let peripherals: Vec<serde_json::Value> = client
        .get(format!("{}/products?category=peripherals", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(peripherals.len(), 1);
    assert_eq!(peripherals[0]["name"], "keyboard");

    let keyboard_id = keyboard["id"].as_str().unwrap();
    let res = client
        .delete(format!("{}/products/{keyboard_id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/products/{keyboard_id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Deleting a product that is already gone reports the miss.
    let res = client
        .delete(format!("{}/products/{keyboard_id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown().await;
}

#[tokio::test]
async fn product_price_change_reprices_open_baskets() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/products", server.base_url))
        .json(&json!({
            "name": "keyboard",
            "categories": ["peripherals"],
            "price": "50.00"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let product: serde_json::Value = res.json().await.unwrap();
    let product_id = product["id"].as_str().unwrap().to_owned();

    client
        .post(format!("{}/basket", server.base_url))
        .json(&json!({
            "user_name": "dave",
            "items": [
                { "product_id": product_id, "product_name": "keyboard",
                  "color": "black", "quantity": 2, "unit_price": "50.00" }
            ]
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .put(format!("{}/products/{product_id}/price", server.base_url))
        .json(&json!({ "price": "60.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Eventually the open basket reflects the new price.
    let mut repriced = false;
    for _ in 0..100 {
        let basket: serde_json::Value = client
            .get(format!("{}/basket/dave", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if basket["total_price"] == "120.00" {
            repriced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(repriced, "basket was not repriced within timeout");

    server.shutdown().await;
}

mod common;

use common::{close, send, spawn_app};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn empty_cart_has_zero_summary() {
    let app = spawn_app().await;
    let token = app.register("Ana", "ana@example.com").await;

    let (status, body) = send(app.get("/cart", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["summary"]["total"], 0.0);
}

#[tokio::test]
async fn adding_twice_grows_the_entry() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Plasters", 2.5, 10).await;

    assert_eq!(app.add_to_cart(&token, id, 2).await, StatusCode::CREATED);
    assert_eq!(app.add_to_cart(&token, id, 3).await, StatusCode::OK);

    let (_, body) = send(app.get("/cart", Some(&token))).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
    assert!(close(body["summary"]["subtotal"].as_f64().unwrap(), 12.5));
}

#[tokio::test]
async fn adding_beyond_stock_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Insulin pen", 30.0, 3).await;

    let (status, body) = send(app.post("/cart", Some(&token)).json(&json!({
        "product_id": id,
        "quantity": 4,
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // the running total counts too
    assert_eq!(app.add_to_cart(&token, id, 2).await, StatusCode::CREATED);
    assert_eq!(app.add_to_cart(&token, id, 2).await, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app.patch(&format!("/cart/{id}"), Some(&token))
            .json(&json!({ "quantity": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_product_and_bad_quantity() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Gauze", 1.0, 10).await;

    assert_eq!(app.add_to_cart(&token, 9999, 1).await, StatusCode::NOT_FOUND);
    assert_eq!(app.add_to_cart(&token, id, 0).await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_matches_order_pricing() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let first = app.simple_product(&admin, "Shampoo", 7.25, 10).await;
    let second = app.simple_product(&admin, "Toothpaste", 3.1, 10).await;

    app.add_to_cart(&token, first, 2).await;
    app.add_to_cart(&token, second, 3).await;

    let (_, body) = send(app.get("/cart", Some(&token))).await;
    let subtotal = 7.25 * 2.0 + 3.1 * 3.0;
    let summary = &body["summary"];
    assert!(close(summary["subtotal"].as_f64().unwrap(), subtotal));
    assert!(close(summary["tax"].as_f64().unwrap(), subtotal * 0.18));
    assert_eq!(summary["shipping_cost"], 0.0);
    assert!(close(summary["total"].as_f64().unwrap(), subtotal * 1.18));
    assert!(close(body["items"][0]["line_total"].as_f64().unwrap(), 14.5));
}

#[tokio::test]
async fn patch_and_remove_entries() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let first = app.simple_product(&admin, "Shampoo", 7.0, 10).await;
    let second = app.simple_product(&admin, "Soap", 2.0, 10).await;
    app.add_to_cart(&token, first, 1).await;
    app.add_to_cart(&token, second, 1).await;

    let (status, _) = send(
        app.patch(&format!("/cart/{first}"), Some(&token))
            .json(&json!({ "quantity": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // quantity zero removes the entry
    let (status, _) = send(
        app.patch(&format!("/cart/{second}"), Some(&token))
            .json(&json!({ "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(app.get("/cart", Some(&token))).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 6);

    let (status, _) = send(app.delete(&format!("/cart/{second}"), Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app.delete(&format!("/cart/{first}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn clear_cart_only_touches_own_entries() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let ana = app.register("Ana", "ana@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let id = app.simple_product(&admin, "Soap", 2.0, 10).await;
    app.add_to_cart(&ana, id, 1).await;
    app.add_to_cart(&bob, id, 1).await;

    let (status, body) = send(app.delete("/cart", Some(&ana))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, body) = send(app.get("/cart", Some(&bob))).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

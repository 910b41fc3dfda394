mod common;

use common::{close, send, spawn_app, TestApp};
use reqwest::StatusCode;
use serde_json::json;

async fn place_order(app: &TestApp, token: &str, product_id: i64, quantity: i32) -> i64 {
    assert_eq!(
        app.add_to_cart(token, product_id, quantity).await,
        StatusCode::CREATED
    );
    let (status, body) = send(app.post("/orders", Some(token))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["order"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn admin_moves_orders_through_statuses() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin B", 6.0, 10).await;
    let order_id = place_order(&app, &token, id, 2).await;

    for status in ["processing", "ready", "paid", "completed"] {
        let (code, body) = send(
            app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
                .json(&json!({ "status": status, "note": format!("now {status}") })),
        )
        .await;
        assert_eq!(code, StatusCode::OK, "{body}");
        assert_eq!(body["order"]["status"], status);
    }

    let (_, body) = send(app.get(&format!("/admin/orders/{order_id}"), Some(&admin))).await;
    let history = body["order"]["history"].as_array().unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[4]["note"], "now completed");
    assert_eq!(body["customer"]["email"], "ana@example.com");

    let (status, _) = send(
        app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
            .json(&json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_cancel_restores_stock_and_is_final() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin B", 6.0, 10).await;
    let order_id = place_order(&app, &token, id, 3).await;

    send(
        app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
            .json(&json!({ "status": "ready" })),
    )
    .await;
    let (status, _) = send(
        app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
            .json(&json!({ "status": "cancelled", "note": "Not collected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.product_stock(&admin, id).await, 10);

    let (status, _) = send(
        app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
            .json(&json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.product_stock(&admin, id).await, 10);

    // cancelling again is only noted, stock is not returned twice
    let (status, body) = send(
        app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
            .json(&json!({ "status": "cancelled", "note": "Customer called" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(app.product_stock(&admin, id).await, 10);
}

#[tokio::test]
async fn repeating_a_status_adds_a_history_entry() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin B", 6.0, 10).await;
    let order_id = place_order(&app, &token, id, 1).await;

    for note in ["Packed", "Waiting for pharmacist"] {
        let (status, body) = send(
            app.patch(&format!("/admin/orders/{order_id}/status"), Some(&admin))
                .json(&json!({ "status": "processing", "note": note })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["order"]["status"], "processing");
    }

    let (_, body) = send(app.get(&format!("/admin/orders/{order_id}"), Some(&admin))).await;
    let history = body["order"]["history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2]["status"], "processing");
    assert_eq!(history[2]["note"], "Waiting for pharmacist");
    assert_eq!(app.product_stock(&admin, id).await, 9);
}

#[tokio::test]
async fn admin_lists_orders_by_status() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin B", 6.0, 10).await;
    let first = place_order(&app, &token, id, 1).await;
    place_order(&app, &token, id, 1).await;

    send(
        app.patch(&format!("/admin/orders/{first}/status"), Some(&admin))
            .json(&json!({ "status": "processing" })),
    )
    .await;

    let (_, body) = send(app.get("/admin/orders", Some(&admin))).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(app.get("/admin/orders?status=processing", Some(&admin))).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["orders"][0]["id"], first);

    let (status, _) = send(app.get("/admin/orders?status=lost", Some(&admin))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_summarize_the_store() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let ana = app.register("Ana", "ana@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    app.create_category(&admin, "Vitamins", None).await;

    let popular = app.simple_product(&admin, "Vitamin C", 10.0, 30).await;
    let rare = app.simple_product(&admin, "Zinc", 5.0, 12).await;

    place_order(&app, &ana, popular, 4).await;
    place_order(&app, &bob, rare, 3).await;
    let cancelled = place_order(&app, &bob, popular, 2).await;
    send(app.post(&format!("/orders/{cancelled}/cancel"), Some(&bob))).await;

    let (status, body) = send(app.get("/admin/stats", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["stats"];

    assert_eq!(stats["users"], 3);
    assert_eq!(stats["products"], 2);
    assert_eq!(stats["categories"], 1);
    assert_eq!(stats["orders"], 3);
    assert!(close(
        stats["revenue"].as_f64().unwrap(),
        (40.0 + 15.0) * 1.18
    ));
    assert_eq!(stats["orders_by_status"]["pending"], 2);
    assert_eq!(stats["orders_by_status"]["cancelled"], 1);
    assert_eq!(stats["orders_by_status"]["completed"], 0);

    let low_stock = stats["low_stock"].as_array().unwrap();
    assert_eq!(low_stock.len(), 1);
    assert_eq!(low_stock[0]["name"], "Zinc");

    assert_eq!(stats["recent_orders"].as_array().unwrap().len(), 3);

    let top = stats["top_products"].as_array().unwrap();
    assert_eq!(top[0]["product_name"], "Vitamin C");
    assert_eq!(top[0]["units_sold"], 4);
    assert_eq!(top[1]["product_name"], "Zinc");

    let months = stats["monthly_revenue"].as_array().unwrap();
    assert_eq!(months.len(), 6);
    assert_eq!(months[5]["orders"], 2);
    assert!(close(
        months[5]["revenue"].as_f64().unwrap(),
        (40.0 + 15.0) * 1.18
    ));
}

#[tokio::test]
async fn metrics_count_requests_and_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin C", 10.0, 30).await;
    place_order(&app, &token, id, 1).await;
    send(app.get("/products/424242", None)).await;

    let (status, body) = send(app.get("/admin/metrics", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    let metrics = &body["metrics"];
    assert_eq!(metrics["orders_created"], 1);
    assert!(metrics["requests_total"].as_u64().unwrap() >= 6);
    assert!(metrics["client_errors"].as_u64().unwrap() >= 1);
    assert_eq!(metrics["server_errors"], 0);
}

#[tokio::test]
async fn admin_manages_users() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    app.register("Ana", "ana@example.com").await;

    let (status, body) = send(app.post("/admin/users", Some(&admin)).json(&json!({
        "name": "Pharmacist",
        "email": "pharmacist@pharmacy.test",
        "password": "Pharma1234",
        "role": "admin",
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let new_admin_id = body["user"]["id"].as_i64().unwrap();
    let pharmacist = app.login("pharmacist@pharmacy.test", "Pharma1234").await;
    let (status, _) = send(app.get("/admin/stats", Some(&pharmacist))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(app.get("/admin/users?role=admin", Some(&admin))).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(app.get("/admin/users?query=ana", Some(&admin))).await;
    assert_eq!(body["total"], 1);

    // demotion takes effect on the next request
    let (status, _) = send(
        app.patch(&format!("/admin/users/{new_admin_id}"), Some(&admin))
            .json(&json!({ "role": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app.get("/admin/stats", Some(&pharmacist))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, me) = send(app.get("/auth/me", Some(&admin))).await;
    let id = me["user"]["id"].as_i64().unwrap();

    let (status, _) = send(app.delete(&format!("/admin/users/{id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleted_customers_leave_their_orders_behind() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;
    let id = app.simple_product(&admin, "Vitamin C", 10.0, 30).await;
    let order_id = place_order(&app, &token, id, 1).await;
    let (_, me) = send(app.get("/auth/me", Some(&token))).await;
    let user_id = me["user"]["id"].as_i64().unwrap();

    let (status, _) = send(app.delete(&format!("/admin/users/{user_id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app.get(&format!("/admin/orders/{order_id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["order"]["user_id"].is_null());
    assert!(body["customer"].is_null());
}

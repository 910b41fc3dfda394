mod common;

use common::{send, spawn_app, spawn_app_with, ADMIN_EMAIL, GOOGLE_CREDENTIAL};
use pharmacy_api::oauth::DisabledVerifier;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn register_returns_token_and_user() {
    let app = spawn_app().await;

    let (status, body) = send(app.post("/auth/register", None).json(&json!({
        "name": "Ana Perez",
        "email": "Ana@Example.com",
        "password": "Secret123",
    })))
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let app = spawn_app().await;
    app.register("Ana", "ana@example.com").await;

    let (status, body) = send(app.post("/auth/register", None).json(&json!({
        "name": "Other Ana",
        "email": "ANA@example.com",
        "password": "Secret123",
    })))
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn invalid_registration_is_rejected() {
    let app = spawn_app().await;

    let (status, body) = send(app.post("/auth/register", None).json(&json!({
        "name": "Ana",
        "email": "not-an-email",
        "password": "short",
    })))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = spawn_app().await;
    app.register("Ana", "ana@example.com").await;

    let (wrong_status, wrong_body) = send(app.post("/auth/login", None).json(&json!({
        "email": "ana@example.com",
        "password": "WrongPass1",
    })))
    .await;
    let (unknown_status, unknown_body) = send(app.post("/auth/login", None).json(&json!({
        "email": "nobody@example.com",
        "password": "Secret123",
    })))
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["error"], unknown_body["error"]);
    assert_eq!(wrong_body["error"], "Invalid email or password");

    let admin = app.admin_token().await;
    let (_, metrics) = send(app.get("/admin/metrics", Some(&admin))).await;
    assert_eq!(metrics["metrics"]["login_failures"], 2);
}

#[tokio::test]
async fn login_timing_does_not_reveal_registered_emails() {
    let app = spawn_app().await;
    app.register("Ana", "ana@example.com").await;

    async fn average_login(app: &common::TestApp, email: &str) -> Duration {
        let mut elapsed = Duration::ZERO;
        for _ in 0..5 {
            let started = Instant::now();
            let (status, _) = send(app.post("/auth/login", None).json(&json!({
                "email": email,
                "password": "WrongPass1",
            })))
            .await;
            elapsed += started.elapsed();
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        elapsed / 5
    }

    // warm the lazily built comparison hash
    average_login(&app, "warmup@example.com").await;

    let known = average_login(&app, "ana@example.com").await;
    let unknown = average_login(&app, "nobody@example.com").await;
    assert!(
        unknown * 4 >= known && known * 4 >= unknown,
        "known={known:?} unknown={unknown:?}"
    );
}

#[tokio::test]
async fn google_only_accounts_cannot_use_password_login() {
    let app = spawn_app().await;
    let (status, _) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": GOOGLE_CREDENTIAL })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app.post("/auth/login", None).json(&json!({
        "email": "googler@example.com",
        "password": "Secret123",
    })))
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn google_sign_in_is_unavailable_without_client_id() {
    let app = spawn_app_with(Arc::new(DisabledVerifier)).await;

    let (status, body) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": GOOGLE_CREDENTIAL })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Google sign-in is not configured");
}

#[tokio::test]
async fn login_and_fetch_profile() {
    let app = spawn_app().await;
    app.register("Ana", "ana@example.com").await;
    let token = app.login("ana@example.com", "Secret123").await;

    let (status, body) = send(app.get("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ana");
    assert_eq!(body["user"]["has_password"], true);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = spawn_app().await;

    let (status, body) = send(app.get("/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(app.get("/cart", Some("not.a.jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app.get("/admin/stats", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customers_are_forbidden_on_admin_routes() {
    let app = spawn_app().await;
    let token = app.register("Ana", "ana@example.com").await;

    let (status, body) = send(app.get("/admin/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = send(app.post("/admin/products", Some(&token)).json(&json!({
        "name": "Aspirin",
        "description": "",
        "price": 1.0,
        "stock": 1,
    })))
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_may_use_customer_routes() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;

    let (status, body) = send(app.get("/auth/me", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["user"]["is_admin"], true);
}

#[tokio::test]
async fn deleted_user_token_stops_working() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register("Ana", "ana@example.com").await;

    let (_, me) = send(app.get("/auth/me", Some(&token))).await;
    let id = me["user"]["id"].as_i64().unwrap();

    let (status, _) = send(app.delete(&format!("/admin/users/{id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app.get("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_sign_in_creates_then_reuses_account() {
    let app = spawn_app().await;

    let (status, body) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": GOOGLE_CREDENTIAL })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "googler@example.com");
    assert_eq!(body["user"]["google_linked"], true);
    assert_eq!(body["user"]["has_password"], false);
    let id = body["user"]["id"].clone();

    let (status, body) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": GOOGLE_CREDENTIAL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id);

    let (status, _) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": "forged" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_sign_in_links_existing_email() {
    let app = spawn_app().await;
    app.register("Googler", "googler@example.com").await;

    let (status, body) = send(
        app.post("/auth/google", None)
            .json(&json!({ "credential": GOOGLE_CREDENTIAL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["google_linked"], true);
    assert_eq!(body["user"]["has_password"], true);
}

#[tokio::test]
async fn profile_and_password_updates() {
    let app = spawn_app().await;
    let token = app.register("Ana", "ana@example.com").await;

    let (status, body) = send(app.patch("/auth/me", Some(&token)).json(&json!({
        "name": "Ana Maria",
        "phone": "+1 555 0101",
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ana Maria");

    let (status, _) = send(app.patch("/auth/me", Some(&token)).json(&json!({
        "current_password": "nope-nope",
        "new_password": "NewSecret456",
    })))
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app.patch("/auth/me", Some(&token)).json(&json!({
        "current_password": "Secret123",
        "new_password": "NewSecret456",
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    app.login("ana@example.com", "NewSecret456").await;
}

#[tokio::test]
async fn addresses_keep_a_single_default() {
    let app = spawn_app().await;
    let token = app.register("Ana", "ana@example.com").await;

    let address = |label: &str, is_default: bool| {
        json!({
            "label": label,
            "line1": "Main Street 1",
            "city": "Springfield",
            "postal_code": "12345",
            "is_default": is_default,
        })
    };

    let (status, first) =
        send(app.post("/auth/addresses", Some(&token)).json(&address("Home", false))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["address"]["is_default"], true);

    let (_, second) =
        send(app.post("/auth/addresses", Some(&token)).json(&address("Work", true))).await;
    assert_eq!(second["address"]["is_default"], true);

    let (_, list) = send(app.get("/auth/addresses", Some(&token))).await;
    let addresses = list["addresses"].as_array().unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(
        addresses.iter().filter(|a| a["is_default"] == true).count(),
        1
    );

    let other = app.register("Bob", "bob@example.com").await;
    let first_id = first["address"]["id"].as_i64().unwrap();
    let (status, _) =
        send(app.delete(&format!("/auth/addresses/{first_id}"), Some(&other))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send(app.delete(&format!("/auth/addresses/{first_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    // removing the default promotes the oldest remaining address
    let (_, cabin) =
        send(app.post("/auth/addresses", Some(&token)).json(&address("Cabin", false))).await;
    assert_eq!(cabin["address"]["is_default"], false);
    let cabin_id = cabin["address"]["id"].as_i64().unwrap();
    let second_id = second["address"]["id"].as_i64().unwrap();
    let (status, _) =
        send(app.delete(&format!("/auth/addresses/{second_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(app.get("/auth/addresses", Some(&token))).await;
    assert_eq!(list["addresses"][0]["id"], cabin_id);
    assert_eq!(list["addresses"][0]["is_default"], true);

    // so does switching the default off
    let (_, lake) =
        send(app.post("/auth/addresses", Some(&token)).json(&address("Lake", true))).await;
    let lake_id = lake["address"]["id"].as_i64().unwrap();
    let (status, body) = send(
        app.patch(&format!("/auth/addresses/{lake_id}"), Some(&token))
            .json(&json!({ "is_default": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["address"]["is_default"], false);

    let (_, list) = send(app.get("/auth/addresses", Some(&token))).await;
    let addresses = list["addresses"].as_array().unwrap();
    assert_eq!(
        addresses.iter().filter(|a| a["is_default"] == true).count(),
        1
    );
    assert_eq!(addresses[0]["id"], cabin_id);
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let app = spawn_app().await;

    let (status, body) = send(app.get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(app.get("/does-not-exist", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

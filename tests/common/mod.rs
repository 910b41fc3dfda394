#![allow(dead_code)]

use async_trait::async_trait;
use pharmacy_api::{
    build_app_with_verifier,
    config::Config,
    error::ApiError,
    oauth::{GoogleIdentity, IdTokenVerifier},
};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@pharmacy.test";
pub const ADMIN_PASSWORD: &str = "Admin123!";
pub const GOOGLE_CREDENTIAL: &str = "valid-google-credential";

/// Stands in for Google's tokeninfo endpoint.
pub struct FakeVerifier;

#[async_trait]
impl IdTokenVerifier for FakeVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, ApiError> {
        if credential == GOOGLE_CREDENTIAL {
            Ok(GoogleIdentity {
                subject: "google-sub-42".to_owned(),
                email: "Googler@Example.com".to_owned(),
                name: Some("Google User".to_owned()),
            })
        } else {
            Err(ApiError::Unauthorized("Invalid Google credential".to_owned()))
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub upload_dir: std::path::PathBuf,
    _dir: TempDir,
}

/// Starts the whole application on an ephemeral port, backed by a fresh
/// SQLite file.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(FakeVerifier)).await
}

pub async fn spawn_app_with(verifier: Arc<dyn IdTokenVerifier>) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("pharmacy.db");
    let upload_dir = dir.path().join("uploads");

    let config = Config {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        db_max_connections: 5,
        jwt_secret: "test-secret".to_owned(),
        token_ttl_hours: 1,
        google_client_id: Some("test-client".to_owned()),
        bind_addr: "127.0.0.1:0".to_owned(),
        upload_dir: upload_dir.clone(),
        file_size_limit: 64 * 1024,
        admin_email: Some(ADMIN_EMAIL.to_owned()),
        admin_password: Some(ADMIN_PASSWORD.to_owned()),
    };

    let app = build_app_with_verifier(config, verifier)
        .await
        .expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: Client::new(),
        upload_dir,
        _dir: dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.get(self.url(path)), token)
    }

    pub fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.post(self.url(path)), token)
    }

    pub fn patch(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.patch(self.url(path)), token)
    }

    pub fn delete(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        with_token(self.client.delete(self.url(path)), token)
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = send(self.post("/auth/login", None).json(&json!({
            "email": email,
            "password": password,
        })))
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().expect("Token not found").to_owned()
    }

    /// Registers a customer and returns their token.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let (status, body) = send(self.post("/auth/register", None).json(&json!({
            "name": name,
            "email": email,
            "password": "Secret123",
        })))
        .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().expect("Token not found").to_owned()
    }

    pub async fn create_category(&self, admin: &str, name: &str, parent_id: Option<i64>) -> i64 {
        let (status, body) = send(self.post("/admin/categories", Some(admin)).json(&json!({
            "name": name,
            "parent_id": parent_id,
        })))
        .await;
        assert_eq!(status, StatusCode::CREATED, "create category failed: {body}");
        body["category"]["id"].as_i64().unwrap()
    }

    pub async fn create_product(&self, admin: &str, payload: Value) -> i64 {
        let (status, body) = send(self.post("/admin/products", Some(admin)).json(&payload)).await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
        body["product"]["id"].as_i64().unwrap()
    }

    pub async fn simple_product(&self, admin: &str, name: &str, price: f64, stock: i32) -> i64 {
        self.create_product(
            admin,
            json!({
                "name": name,
                "description": format!("{name} description"),
                "price": price,
                "stock": stock,
            }),
        )
        .await
    }

    pub async fn add_to_cart(&self, token: &str, product_id: i64, quantity: i32) -> StatusCode {
        let (status, _) = send(self.post("/cart", Some(token)).json(&json!({
            "product_id": product_id,
            "quantity": quantity,
        })))
        .await;
        status
    }

    pub async fn product_stock(&self, admin: &str, product_id: i64) -> i64 {
        let (_, body) = send(self.get(&format!("/admin/products/{product_id}"), Some(admin))).await;
        body["product"]["stock"].as_i64().unwrap()
    }
}

fn with_token(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

/// Sends the request and returns its status with the JSON body
/// (`Value::Null` when the body is not JSON).
pub async fn send(builder: RequestBuilder) -> (StatusCode, Value) {
    let response = builder.send().await.expect("Failed to send request");
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

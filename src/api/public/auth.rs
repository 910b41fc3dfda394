use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::config::Config;
use crate::entities::user::{self, Entity as UserEntity, Role};
use crate::error::{ApiError, ApiResult};
use crate::metrics::Metrics;
use crate::middleware::auth::{generate_token, hash_password, verify_login};
use crate::oauth::IdTokenVerifier;
use crate::utils::normalize_email;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn auth_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_login))
        .layer(Extension(db))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Json(payload): Json<RegisterPayload>,
) -> ApiResult {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let txn = db.begin().await?;
    let taken = UserEntity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let new_user = user::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        email: Set(email),
        password: Set(Some(hash_password(&payload.password)?)),
        google_id: Set(None),
        role: Set(Role::User),
        phone: Set(payload.phone),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let model = new_user.insert(&txn).await?;
    txn.commit().await?;

    info!(user_id = model.id, "Registered user");
    let token = generate_token(model.id, model.role, &config)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "token": token,
            "user": UserResponse::from(model),
        })),
    )
        .into_response())
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(metrics): Extension<Arc<Metrics>>,
    Json(payload): Json<UserLogin>,
) -> ApiResult {
    let email = normalize_email(&payload.email);
    let found = UserEntity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&*db)
        .await?;

    // Same answer, and the same argon2 cost, for unknown email and wrong password.
    let verified = verify_login(found.as_ref(), &payload.password);
    let model = match found {
        Some(model) if verified => model,
        _ => {
            metrics.login_failed();
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        }
    };

    let token = generate_token(model.id, model.role, &config)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "token": token,
            "user": UserResponse::from(model),
        })),
    )
        .into_response())
}

async fn google_login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(verifier): Extension<Arc<dyn IdTokenVerifier>>,
    Json(payload): Json<GoogleLogin>,
) -> ApiResult {
    if payload.credential.trim().is_empty() {
        return Err(ApiError::bad_request("Missing Google credential"));
    }
    let identity = verifier.verify(payload.credential.trim()).await?;
    let email = normalize_email(&identity.email);

    let txn = db.begin().await?;
    let by_google = UserEntity::find()
        .filter(user::Column::GoogleId.eq(identity.subject.as_str()))
        .one(&txn)
        .await?;

    let (model, created) = match by_google {
        Some(model) => (model, false),
        None => {
            let by_email = UserEntity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(&txn)
                .await?;
            match by_email {
                // link an existing local account
                Some(existing) => {
                    let mut active: user::ActiveModel = existing.into();
                    active.google_id = Set(Some(identity.subject.clone()));
                    (active.update(&txn).await?, false)
                }
                None => {
                    let name = identity
                        .name
                        .clone()
                        .unwrap_or_else(|| email.split('@').next().unwrap_or("Customer").to_owned());
                    let new_user = user::ActiveModel {
                        name: Set(name),
                        email: Set(email.clone()),
                        password: Set(None),
                        google_id: Set(Some(identity.subject.clone())),
                        role: Set(Role::User),
                        phone: Set(None),
                        created_at: Set(Utc::now()),
                        ..Default::default()
                    };
                    (new_user.insert(&txn).await?, true)
                }
            }
        }
    };
    txn.commit().await?;

    let token = generate_token(model.id, model.role, &config)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "token": token,
            "user": UserResponse::from(model),
        })),
    )
        .into_response())
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct RegisterPayload {
    #[validate(length(min = 2, max = 80))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(max = 32))]
    phone: Option<String>,
}

#[derive(Deserialize)]
struct UserLogin {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct GoogleLogin {
    credential: String,
}

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_admin: bool,
    pub phone: Option<String>,
    pub has_password: bool,
    pub google_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(value: user::Model) -> Self {
        UserResponse {
            is_admin: value.is_admin(),
            has_password: value.password.is_some(),
            google_linked: value.google_id.is_some(),
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
            phone: value.phone,
            created_at: value.created_at,
        }
    }
}

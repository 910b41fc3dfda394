use crate::config::Config;
use crate::entities::user::{self, Role};
use crate::error::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(AuthMiddlewareError::MissingToken)?;
    let claims = validate_token(&state.db, &state.config, token, state.role).await?;

    debug!(user_id = claims.user_id, role = %claims.role, "Authenticated request");
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: Role,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub role: Role,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn generate_token(
    user_id: i32,
    role: Role,
    config: &Config,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims { user_id, role, exp };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

/// Signature and expiry only; the user is not looked up.
pub fn decode_claims(token: &str, config: &Config) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthMiddlewareError::TokenExpired,
        _ => AuthMiddlewareError::ValidationFail,
    })
}

/// Claims are re-checked against the stored user so a deleted or demoted
/// account loses access before its token expires.
pub async fn validate_token(
    db: &DatabaseConnection,
    config: &Config,
    token: &str,
    req_role: Role,
) -> Result<Claims, AuthMiddlewareError> {
    let mut claims = decode_claims(token, config)?;

    let user = user::Entity::find_by_id(claims.user_id)
        .one(db)
        .await
        .map_err(|err| AuthMiddlewareError::InternalServerError(err.to_string()))?
        .ok_or(AuthMiddlewareError::InvalidUser)?;

    if !user.role.satisfies(req_role) {
        return Err(AuthMiddlewareError::InsufficientRole);
    }

    claims.role = user.role;
    Ok(claims)
}

/// Optional authentication for public routes: a bad token is ignored.
pub fn optional_claims(headers: &HeaderMap, config: &Config) -> Option<Claims> {
    bearer_token(headers).and_then(|token| decode_claims(token, config).ok())
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::PasswordHash(err.to_string()))
}

/// Hash that no submitted password is checked into an account with.
static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("no-account-uses-this-password").unwrap_or_default());

/// Checks login credentials. Unknown emails and accounts without a local
/// password still pay for one argon2 verification.
pub fn verify_login(account: Option<&user::Model>, password: &str) -> bool {
    match account {
        Some(model) if model.password.is_some() => model.check_hash(password).is_ok(),
        _ => {
            verify_dummy(password);
            false
        }
    }
}

fn verify_dummy(password: &str) -> bool {
    PasswordHash::new(DUMMY_HASH.as_str())
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid user")]
    InvalidUser,
    #[error("Insufficient permissions")]
    InsufficientRole,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<AuthMiddlewareError> for ApiError {
    fn from(err: AuthMiddlewareError) -> Self {
        match err {
            AuthMiddlewareError::InsufficientRole => ApiError::Forbidden(err.to_string()),
            AuthMiddlewareError::GenerationFail => ApiError::TokenGeneration,
            AuthMiddlewareError::InternalServerError(detail) => ApiError::Db(detail),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::public::auth::UserResponse;
use crate::entities::{
    address::{self, Entity as AddressEntity},
    user::{self, Entity as UserEntity},
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{hash_password, Claims};

pub fn profile_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/auth/me", get(get_me).patch(patch_me))
        .route("/auth/addresses", get(get_addresses).post(post_address))
        .route(
            "/auth/addresses/:id",
            patch(patch_address).delete(delete_address),
        )
        .layer(Extension(db))
}

async fn get_me(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let model = current_user(&*db, claims.user_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "user": UserResponse::from(model) })),
    )
        .into_response())
}

async fn patch_me(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchProfile>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;
    let model = current_user(&txn, claims.user_id).await?;

    let new_hash = match payload.new_password.as_deref() {
        Some(new_password) => {
            // Google-only accounts may set a first password without one.
            if model.password.is_some() {
                let current = payload.current_password.as_deref().ok_or_else(|| {
                    ApiError::bad_request("current_password is required to change the password")
                })?;
                model.check_hash(current).map_err(|_| {
                    ApiError::Unauthorized("Current password is incorrect".to_owned())
                })?;
            }
            Some(hash_password(new_password)?)
        }
        None => None,
    };

    let mut active: user::ActiveModel = model.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_owned());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
    }
    if let Some(hash) = new_hash {
        active.password = Set(Some(hash));
    }
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Profile updated",
            "user": UserResponse::from(updated),
        })),
    )
        .into_response())
}

async fn get_addresses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let addresses = AddressEntity::find()
        .filter(address::Column::UserId.eq(claims.user_id))
        .order_by_desc(address::Column::IsDefault)
        .order_by_asc(address::Column::Id)
        .all(&*db)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "addresses": addresses })),
    )
        .into_response())
}

async fn post_address(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddressPayload>,
) -> ApiResult {
    payload.validate()?;
    let user_id = claims.user_id;
    let txn = db.begin().await?;

    let existing = AddressEntity::find()
        .filter(address::Column::UserId.eq(user_id))
        .count(&txn)
        .await?;
    // the first address is always the default one
    let is_default = existing == 0 || payload.is_default.unwrap_or(false);
    if is_default {
        clear_default(&txn, user_id).await?;
    }

    let model = address::ActiveModel {
        user_id: Set(user_id),
        label: Set(payload.label.trim().to_owned()),
        line1: Set(payload.line1.trim().to_owned()),
        line2: Set(payload.line2),
        city: Set(payload.city.trim().to_owned()),
        postal_code: Set(payload.postal_code.trim().to_owned()),
        phone: Set(payload.phone),
        is_default: Set(is_default),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id, address_id = model.id, "Address added");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "address": model })),
    )
        .into_response())
}

async fn patch_address(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchAddress>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;
    let model = own_address(&txn, id, claims.user_id).await?;

    if payload.is_default == Some(true) {
        clear_default(&txn, claims.user_id).await?;
    }

    let mut active: address::ActiveModel = model.into();
    if let Some(label) = payload.label {
        active.label = Set(label.trim().to_owned());
    }
    if let Some(line1) = payload.line1 {
        active.line1 = Set(line1.trim().to_owned());
    }
    if let Some(line2) = payload.line2 {
        active.line2 = Set(Some(line2).filter(|l| !l.trim().is_empty()));
    }
    if let Some(city) = payload.city {
        active.city = Set(city.trim().to_owned());
    }
    if let Some(postal_code) = payload.postal_code {
        active.postal_code = Set(postal_code.trim().to_owned());
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
    }
    if let Some(is_default) = payload.is_default {
        active.is_default = Set(is_default);
    }
    active.update(&txn).await?;
    ensure_default(&txn, claims.user_id).await?;
    let updated = own_address(&txn, id, claims.user_id).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "address": updated })),
    )
        .into_response())
}

async fn delete_address(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    let txn = db.begin().await?;
    let model = own_address(&txn, id, claims.user_id).await?;
    AddressEntity::delete_by_id(model.id).exec(&txn).await?;
    ensure_default(&txn, claims.user_id).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

//utilities
async fn current_user<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<user::Model, ApiError> {
    UserEntity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn own_address<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    user_id: i32,
) -> Result<address::Model, ApiError> {
    AddressEntity::find_by_id(id)
        .filter(address::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No address with {} id was found.", id)))
}

async fn clear_default<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<(), DbErr> {
    AddressEntity::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Promotes the oldest address when the user has addresses but no default.
async fn ensure_default<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<(), DbErr> {
    let defaults = AddressEntity::find()
        .filter(address::Column::UserId.eq(user_id))
        .filter(address::Column::IsDefault.eq(true))
        .count(conn)
        .await?;
    if defaults > 0 {
        return Ok(());
    }

    let oldest = AddressEntity::find()
        .filter(address::Column::UserId.eq(user_id))
        .order_by_asc(address::Column::Id)
        .one(conn)
        .await?;
    if let Some(oldest) = oldest {
        let mut active: address::ActiveModel = oldest.into();
        active.is_default = Set(true);
        active.update(conn).await?;
    }
    Ok(())
}

//Structs
#[derive(Deserialize, Validate)]
struct PatchProfile {
    #[validate(length(min = 2, max = 80))]
    name: Option<String>,
    #[validate(length(max = 32))]
    phone: Option<String>,
    current_password: Option<String>,
    #[validate(length(min = 8, max = 128))]
    new_password: Option<String>,
}

#[derive(Deserialize, Validate)]
struct AddressPayload {
    #[validate(length(min = 1, max = 40))]
    label: String,
    #[validate(length(min = 3, max = 120))]
    line1: String,
    #[validate(length(max = 120))]
    line2: Option<String>,
    #[validate(length(min = 2, max = 80))]
    city: String,
    #[validate(length(min = 3, max = 12))]
    postal_code: String,
    #[validate(length(max = 32))]
    phone: Option<String>,
    is_default: Option<bool>,
}

#[derive(Deserialize, Validate)]
struct PatchAddress {
    #[validate(length(min = 1, max = 40))]
    label: Option<String>,
    #[validate(length(min = 3, max = 120))]
    line1: Option<String>,
    #[validate(length(max = 120))]
    line2: Option<String>,
    #[validate(length(min = 2, max = 80))]
    city: Option<String>,
    #[validate(length(min = 3, max = 12))]
    postal_code: Option<String>,
    #[validate(length(max = 32))]
    phone: Option<String>,
    is_default: Option<bool>,
}

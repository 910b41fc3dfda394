use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::public::auth::UserResponse;
use crate::api::user::review::refresh_rating;
use crate::entities::{
    address, cart, order, review,
    user::{self, Entity as UserEntity, Role},
    wishlist,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{hash_password, Claims};
use crate::utils::{normalize_email, page_params};

//ROUTERS
pub fn admin_user_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/users", get(get_users).post(create_user))
        .route("/users/:id", patch(patch_user).delete(admin_delete_user))
        .layer(Extension(db))
}

//ROUTES
async fn get_users(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<UsersQuery>,
) -> ApiResult {
    let (page, limit) = page_params(query.page, query.limit, 20, 100);

    let order = match query.order.as_deref() {
        Some("desc") => sea_orm::Order::Desc,
        _ => sea_orm::Order::Asc,
    };

    let sort_users = match query.sort_by.as_deref() {
        Some("name") => user::Column::Name,
        Some("email") => user::Column::Email,
        Some("role") => user::Column::Role,
        Some("created_at") => user::Column::CreatedAt,
        _ => user::Column::Id,
    };

    let mut user_finder = UserEntity::find();

    if let Some(role) = query.role {
        user_finder = user_finder.filter(user::Column::Role.eq(role));
    }

    if let Some(query) = query.query.filter(|q| !q.trim().is_empty()) {
        let mut query_condition = Condition::any()
            .add(user::Column::Name.contains(query.trim()))
            .add(user::Column::Email.contains(query.trim()));
        if let Ok(id) = query.trim().parse::<i32>() {
            query_condition = query_condition.add(user::Column::Id.eq(id));
        }
        user_finder = user_finder.filter(query_condition);
    }

    let paginator = user_finder.order_by(sort_users, order).paginate(&*db, limit);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    let users: Vec<UserResponse> = paginator
        .fetch_page(page - 1)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "users": users,
            "page": page,
            "pages": pages,
            "total": total,
        })),
    )
        .into_response())
}

async fn create_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateUser>,
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

    let model = user::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        email: Set(email),
        password: Set(Some(hash_password(&payload.password)?)),
        google_id: Set(None),
        role: Set(payload.role.unwrap_or(Role::User)),
        phone: Set(payload.phone),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id = model.id, role = %model.role, "User created by admin");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": UserResponse::from(model),
        })),
    )
        .into_response())
}

async fn patch_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchUser>,
) -> ApiResult {
    payload.validate()?;
    if id == claims.user_id && payload.role == Some(Role::User) {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }

    let txn = db.begin().await?;
    let existing = UserEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No user with {} id was found.", id)))?;
    let mut model: user::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_owned());
    }
    if let Some(phone) = payload.phone {
        model.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
    }
    if let Some(role) = payload.role {
        model.role = Set(role);
    }
    if let Some(password) = payload.password {
        model.password = Set(Some(hash_password(&password)?));
    }

    let updated = model.update(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Resource patched successfully",
            "user": UserResponse::from(updated),
        })),
    )
        .into_response())
}

/// Hard delete. Orders stay for the books with their user detached.
async fn admin_delete_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult {
    if id == claims.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let txn = db.begin().await?;
    UserEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No user with {} id was found.", id)))?;

    order::Entity::update_many()
        .col_expr(order::Column::UserId, Expr::value(Option::<i32>::None))
        .filter(order::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    cart::Entity::delete_many()
        .filter(cart::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    wishlist::Entity::delete_many()
        .filter(wishlist::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    address::Entity::delete_many()
        .filter(address::Column::UserId.eq(id))
        .exec(&txn)
        .await?;

    let reviewed: Vec<i32> = review::Entity::find()
        .filter(review::Column::UserId.eq(id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.product_id)
        .collect();
    review::Entity::delete_many()
        .filter(review::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    for product_id in reviewed {
        refresh_rating(&txn, product_id).await?;
    }

    UserEntity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id = id, "User deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

//Structs
#[derive(Deserialize)]
struct UsersQuery {
    query: Option<String>,
    role: Option<Role>,
    sort_by: Option<String>,
    order: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Validate)]
struct CreateUser {
    #[validate(length(min = 2, max = 80))]
    name: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(max = 32))]
    phone: Option<String>,
    role: Option<Role>,
}

#[derive(Deserialize, Validate)]
struct PatchUser {
    #[validate(length(min = 2, max = 80))]
    name: Option<String>,
    #[validate(length(max = 32))]
    phone: Option<String>,
    role: Option<Role>,
    #[validate(length(min = 8, max = 128))]
    password: Option<String>,
}

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::admin::product::ensure_image;
use crate::api::public::category::CategoryResponse;
use crate::entities::{category, category::Entity as CategoryEntity, product};
use crate::error::{ApiError, ApiResult};
use crate::utils::slugify;

//ROUTERS
pub fn admin_category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/categories", post(create_category))
        .route(
            "/categories/:id",
            get(admin_get_category)
                .patch(patch_category)
                .delete(delete_category),
        )
        .layer(Extension(db))
}

//ROUTES
async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCategory>,
) -> ApiResult {
    payload.validate()?;
    let name = payload.name.trim().to_owned();
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::bad_request("Category name needs letters or digits"));
    }

    let txn = db.begin().await?;
    ensure_unique_name(&txn, &name, &slug, None).await?;
    if let Some(parent_id) = payload.parent_id {
        find_category(&txn, parent_id)
            .await
            .map_err(|err| missing_parent(err, parent_id))?;
    }
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
    }

    let model = category::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        parent_id: Set(payload.parent_id),
        image_id: Set(payload.image_id),
        is_featured: Set(payload.is_featured.unwrap_or_default()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(category_id = model.id, name = %model.name, "Category created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Category created successfully",
            "category": CategoryResponse::from(model),
        })),
    )
        .into_response())
}

async fn admin_get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let model = find_category(&*db, id).await?;
    let product_count = product::Entity::find()
        .filter(product::Column::CategoryId.eq(id))
        .count(&*db)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "category": CategoryResponse::from(model),
            "product_count": product_count,
        })),
    )
        .into_response())
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCategoryPayload>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;
    let existing = find_category(&txn, id).await?;
    let mut model: category::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        let name = name.trim().to_owned();
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ApiError::bad_request("Category name needs letters or digits"));
        }
        ensure_unique_name(&txn, &name, &slug, Some(id)).await?;
        model.name = Set(name);
        model.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        model.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
    }
    if payload.clear_parent == Some(true) {
        model.parent_id = Set(None);
    } else if let Some(parent_id) = payload.parent_id {
        check_parent(&txn, id, parent_id).await?;
        model.parent_id = Set(Some(parent_id));
    }
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
        model.image_id = Set(Some(image_id));
    }
    if let Some(is_featured) = payload.is_featured {
        model.is_featured = Set(is_featured);
    }

    let updated = model.update(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Resource patched successfully",
            "category": CategoryResponse::from(updated),
        })),
    )
        .into_response())
}

/// Hard delete. Products and subcategories are detached, not removed.
async fn delete_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let txn = db.begin().await?;
    find_category(&txn, id).await?;

    product::Entity::update_many()
        .col_expr(product::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(product::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    CategoryEntity::update_many()
        .col_expr(category::Column::ParentId, Expr::value(Option::<i32>::None))
        .filter(category::Column::ParentId.eq(id))
        .exec(&txn)
        .await?;
    CategoryEntity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    info!(category_id = id, "Category deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

//utilities
async fn find_category<C: ConnectionTrait>(conn: &C, id: i32) -> Result<category::Model, ApiError> {
    CategoryEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No category with {} id was found.", id)))
}

async fn ensure_unique_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = CategoryEntity::find().filter(
        Condition::any()
            .add(category::Column::Name.eq(name))
            .add(category::Column::Slug.eq(slug)),
    );
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::conflict("Category already exists"));
    }
    Ok(())
}

/// The parent must exist and must not be the category itself or one of
/// its descendants.
async fn check_parent<C: ConnectionTrait>(conn: &C, id: i32, parent_id: i32) -> Result<(), ApiError> {
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == id {
            return Err(ApiError::bad_request("A category cannot be its own parent"));
        }
        let ancestor = find_category(conn, current)
            .await
            .map_err(|err| missing_parent(err, current))?;
        cursor = ancestor.parent_id;
    }
    Ok(())
}

/// An unknown parent is a bad request; database failures stay 500.
fn missing_parent(err: ApiError, parent_id: i32) -> ApiError {
    match err {
        ApiError::NotFound(_) => {
            ApiError::bad_request(format!("No parent category with {} id was found", parent_id))
        }
        other => other,
    }
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CreateCategory {
    #[validate(length(min = 2, max = 80))]
    name: String,
    #[validate(length(max = 500))]
    description: Option<String>,
    parent_id: Option<i32>,
    image_id: Option<i32>,
    is_featured: Option<bool>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchCategoryPayload {
    #[validate(length(min = 2, max = 80))]
    name: Option<String>,
    #[validate(length(max = 500))]
    description: Option<String>,
    parent_id: Option<i32>,
    clear_parent: Option<bool>,
    image_id: Option<i32>,
    is_featured: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_parent_is_bad_request() {
        let err = missing_parent(ApiError::not_found("No category with 9 id was found."), 9);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No parent category with 9 id was found");
    }

    #[test]
    fn database_failures_pass_through() {
        let err = missing_parent(ApiError::Db("database is locked".into()), 9);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

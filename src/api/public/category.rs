use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{category, category::Entity as CategoryEntity};
use crate::error::{ApiError, ApiResult};

pub fn category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/categories", get(get_categories))
        .route("/categories/:id", get(get_category))
        .layer(Extension(db))
}

async fn get_categories(
    Query(params): Query<GetCategoriesQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let mut half_result = CategoryEntity::find();

    if Some(true) == params.featured {
        half_result = half_result.filter(category::Column::IsFeatured.eq(true));
    }

    let categories: Vec<CategoryResponse> = half_result
        .order_by_asc(category::Column::Name)
        .all(&*db)
        .await?
        .into_iter()
        .map(CategoryResponse::from)
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "categories": categories })),
    )
        .into_response())
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let found = CategoryEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No category with {} id was found.", id)))?;

    let children: Vec<CategoryResponse> = CategoryEntity::find()
        .filter(category::Column::ParentId.eq(id))
        .order_by_asc(category::Column::Name)
        .all(&*db)
        .await?
        .into_iter()
        .map(CategoryResponse::from)
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "category": CategoryResponse::from(found),
            "children": children,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct GetCategoriesQuery {
    featured: Option<bool>,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub image_id: Option<i32>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(value: category::Model) -> Self {
        CategoryResponse {
            id: value.id,
            name: value.name,
            slug: value.slug,
            description: value.description,
            parent_id: value.parent_id,
            image_id: value.image_id,
            is_featured: value.is_featured,
            created_at: value.created_at,
        }
    }
}

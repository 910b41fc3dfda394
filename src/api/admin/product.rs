use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::api::public::product::sort_products;
use crate::entities::{
    category, image,
    product::{self, Entity as ProductEntity},
};
use crate::error::{ApiError, ApiResult};
use crate::utils::{page_params, slugify};

//ROUTERS
pub fn admin_product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(admin_get_products).post(create_product))
        .route(
            "/products/:id",
            get(admin_get_product)
                .patch(patch_product)
                .delete(delete_product),
        )
        .layer(Extension(db))
}

//ROUTES
async fn admin_get_products(
    Query(params): Query<AdminProductsQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let (page, limit) = page_params(params.page, params.limit, 20, 100);

    let mut half_result = ProductEntity::find();
    if let Some(active) = params.active {
        half_result = half_result.filter(product::Column::IsActive.eq(active));
    }
    if let Some(category_id) = params.category {
        half_result = half_result.filter(product::Column::CategoryId.eq(category_id));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        half_result = half_result.filter(
            Condition::any()
                .add(product::Column::Name.contains(search))
                .add(product::Column::Brand.contains(search)),
        );
    }
    if let Some(max_stock) = params.max_stock {
        half_result = half_result.filter(product::Column::Stock.lte(max_stock));
    }

    let paginator = sort_products(half_result, params.sort.as_deref()).paginate(&*db, limit);
    let total = paginator.num_items().await?;
    let pages = paginator.num_pages().await?;
    let products = paginator.fetch_page(page - 1).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "products": products,
            "page": page,
            "pages": pages,
            "total": total,
        })),
    )
        .into_response())
}

async fn admin_get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let prod = find_product(&*db, id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "product": prod })),
    )
        .into_response())
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateProduct>,
) -> ApiResult {
    payload.validate()?;
    check_discount(
        payload.discount_percentage,
        payload.discount_start,
        payload.discount_end,
    )?;

    let name = payload.name.trim().to_owned();
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::bad_request("Product name needs letters or digits"));
    }

    let txn = db.begin().await?;
    ensure_unique_name(&txn, &name, &slug, None).await?;
    if let Some(category_id) = payload.category_id {
        ensure_category(&txn, category_id).await?;
    }
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
    }

    let now = Utc::now();
    let new_product = product::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        brand: Set(payload.brand),
        price: Set(payload.price),
        stock: Set(payload.stock),
        category_id: Set(payload.category_id),
        image_id: Set(payload.image_id),
        requires_prescription: Set(payload.requires_prescription.unwrap_or_default()),
        is_featured: Set(payload.is_featured.unwrap_or_default()),
        is_active: Set(payload.is_active.unwrap_or(true)),
        discount_percentage: Set(payload.discount_percentage),
        discount_start: Set(payload.discount_start),
        discount_end: Set(payload.discount_end),
        rating: Set(0.0),
        num_reviews: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_product.insert(&txn).await?;
    txn.commit().await?;

    info!(product_id = model.id, name = %model.name, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product created successfully",
            "product": model,
        })),
    )
        .into_response())
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchProductPayload>,
) -> ApiResult {
    payload.validate()?;
    let txn = db.begin().await?;
    let existing = find_product(&txn, id).await?;

    // discount fields are checked as the combination they will end up in
    let (percentage, start, end) = if payload.clear_discount == Some(true) {
        (None, None, None)
    } else {
        (
            payload.discount_percentage.or(existing.discount_percentage),
            payload.discount_start.or(existing.discount_start),
            payload.discount_end.or(existing.discount_end),
        )
    };
    check_discount(percentage, start, end)?;

    let mut prod: product::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        let name = name.trim().to_owned();
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(ApiError::bad_request("Product name needs letters or digits"));
        }
        ensure_unique_name(&txn, &name, &slug, Some(id)).await?;
        prod.name = Set(name);
        prod.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        prod.description = Set(description);
    }
    if let Some(brand) = payload.brand {
        prod.brand = Set(Some(brand).filter(|b| !b.trim().is_empty()));
    }
    if let Some(price) = payload.price {
        prod.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        prod.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        ensure_category(&txn, category_id).await?;
        prod.category_id = Set(Some(category_id));
    }
    if let Some(image_id) = payload.image_id {
        ensure_image(&txn, image_id).await?;
        prod.image_id = Set(Some(image_id));
    }
    if let Some(requires_prescription) = payload.requires_prescription {
        prod.requires_prescription = Set(requires_prescription);
    }
    if let Some(is_featured) = payload.is_featured {
        prod.is_featured = Set(is_featured);
    }
    if let Some(is_active) = payload.is_active {
        prod.is_active = Set(is_active);
    }
    prod.discount_percentage = Set(percentage);
    prod.discount_start = Set(start);
    prod.discount_end = Set(end);
    prod.updated_at = Set(Utc::now());

    let updated = prod.update(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Resource patched successfully",
            "product": updated,
        })),
    )
        .into_response())
}

/// Soft delete: the row stays so past orders keep pointing at it.
async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> ApiResult {
    let txn = db.begin().await?;
    let existing = find_product(&txn, id).await?;

    let mut prod: product::ActiveModel = existing.into();
    prod.is_active = Set(false);
    prod.is_featured = Set(false);
    prod.updated_at = Set(Utc::now());
    prod.update(&txn).await?;
    txn.commit().await?;

    info!(product_id = id, "Product deactivated");
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

//utilities
async fn find_product<C: ConnectionTrait>(conn: &C, id: i32) -> Result<product::Model, ApiError> {
    ProductEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No product with {} id was found.", id)))
}

async fn ensure_unique_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = ProductEntity::find().filter(
        Condition::any()
            .add(product::Column::Name.eq(name))
            .add(product::Column::Slug.eq(slug)),
    );
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::conflict("Product already exists"));
    }
    Ok(())
}

pub(crate) async fn ensure_category<C: ConnectionTrait>(
    conn: &C,
    category_id: i32,
) -> Result<(), ApiError> {
    category::Entity::find_by_id(category_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| {
            ApiError::bad_request(format!("No category with {} id was found", category_id))
        })
}

pub(crate) async fn ensure_image<C: ConnectionTrait>(conn: &C, image_id: i32) -> Result<(), ApiError> {
    image::Entity::find_by_id(image_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request(format!("No image with {} id was found", image_id)))
}

/// A discount is all three of percentage, start and end, or nothing.
fn check_discount(
    percentage: Option<f64>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ApiError> {
    match (percentage, start, end) {
        (None, None, None) => Ok(()),
        (Some(percentage), Some(start), Some(end)) => {
            if !(percentage > 0.0 && percentage <= 100.0) {
                return Err(ApiError::bad_request(
                    "discount_percentage must be within (0, 100]",
                ));
            }
            if start > end {
                return Err(ApiError::bad_request(
                    "discount_start must not be after discount_end",
                ));
            }
            Ok(())
        }
        _ => Err(ApiError::bad_request(
            "discount_percentage, discount_start and discount_end must be set together",
        )),
    }
}

//Structs
#[derive(Deserialize)]
struct AdminProductsQuery {
    active: Option<bool>,
    category: Option<i32>,
    search: Option<String>,
    max_stock: Option<i32>,
    sort: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Deserialize, Validate, Debug)]
struct CreateProduct {
    #[validate(length(min = 2, max = 120))]
    name: String,
    #[validate(length(max = 5000))]
    description: String,
    #[validate(length(max = 80))]
    brand: Option<String>,
    #[validate(range(min = 0.0))]
    price: f64,
    #[validate(range(min = 0))]
    stock: i32,
    category_id: Option<i32>,
    image_id: Option<i32>,
    requires_prescription: Option<bool>,
    is_featured: Option<bool>,
    is_active: Option<bool>,
    discount_percentage: Option<f64>,
    discount_start: Option<DateTime<Utc>>,
    discount_end: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchProductPayload {
    #[validate(length(min = 2, max = 120))]
    name: Option<String>,
    #[validate(length(max = 5000))]
    description: Option<String>,
    #[validate(length(max = 80))]
    brand: Option<String>,
    #[validate(range(min = 0.0))]
    price: Option<f64>,
    #[validate(range(min = 0))]
    stock: Option<i32>,
    category_id: Option<i32>,
    image_id: Option<i32>,
    requires_prescription: Option<bool>,
    is_featured: Option<bool>,
    is_active: Option<bool>,
    discount_percentage: Option<f64>,
    discount_start: Option<DateTime<Utc>>,
    discount_end: Option<DateTime<Utc>>,
    clear_discount: Option<bool>,
}

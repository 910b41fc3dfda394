use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::{io::ErrorKind, sync::Arc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::image::FileExtension;
use crate::entities::{category, image, image::Entity as ImageEntity, product};
use crate::error::{ApiError, ApiResult};

static FILE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{3,40}$").unwrap());

/// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

//Routers
pub fn upload_router(db: Arc<DatabaseConnection>, file_size_limit: usize) -> Router {
    Router::new()
        .route("/images", get(get_images).post(upload))
        .route("/images/:id", delete(delete_image))
        .layer(DefaultBodyLimit::max(file_size_limit + MULTIPART_OVERHEAD))
        .layer(Extension(db))
}

//Routes
/// Stores the first file of the form. The multipart field name becomes the
/// image's display name.
async fn upload(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    mut multipart: Multipart,
) -> ApiResult {
    let field = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Malformed multipart body: {err}")))?
        .ok_or_else(|| ApiError::bad_request("No file was sent"))?;

    let content_type = field
        .content_type()
        .ok_or_else(|| ApiError::bad_request("Content type is not set."))?
        .to_owned();
    let file_extension = FileExtension::from_content_type(&content_type)
        .ok_or_else(|| ApiError::bad_request("Unsupported content type. Use image/jpeg or image/png."))?;

    let file_name = field
        .name()
        .ok_or_else(|| ApiError::bad_request("File name is not set."))?
        .to_owned();
    if !FILE_NAME_REGEX.is_match(&file_name) {
        return Err(ApiError::bad_request(
            "Invalid file name. It should contain only Latin letters, numbers, '-', or '_'.",
        ));
    }

    let data = field.bytes().await.map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::bad_request(format!("Failed to read file bytes: {err}"))
        }
    })?;
    if data.len() > config.file_size_limit {
        return Err(ApiError::PayloadTooLarge);
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("File is empty"));
    }

    let txn = db.begin().await?;
    let taken = ImageEntity::find()
        .filter(image::Column::FileName.eq(file_name.as_str()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(ApiError::conflict("Image already exists"));
    }

    let model = image::ActiveModel {
        file_name: Set(file_name),
        path_name: Set(Uuid::new_v4().to_string()),
        extension: Set(file_extension),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let path = config.upload_dir.join(model.stored_name());
    tokio::fs::write(&path, &data)
        .await
        .map_err(|err| ApiError::Internal(format!("Failed to write {}: {err}", path.display())))?;

    if let Err(err) = txn.commit().await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(err.into());
    }

    info!(image_id = model.id, bytes = data.len(), "Image uploaded");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "File uploaded successfully.",
            "image": model,
        })),
    )
        .into_response())
}

async fn get_images(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<ImagesQuery>,
) -> ApiResult {
    let mut finder = ImageEntity::find();

    if let Some(query) = query.query.filter(|q| !q.trim().is_empty()) {
        let mut query_condition =
            Condition::any().add(image::Column::FileName.contains(query.trim()));
        if let Ok(id) = query.trim().parse::<i32>() {
            query_condition = query_condition.add(image::Column::Id.eq(id));
        }
        finder = finder.filter(query_condition);
    }

    let images = finder.order_by_asc(image::Column::Id).all(&*db).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "images": images })),
    )
        .into_response())
}

async fn delete_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> ApiResult {
    let txn = db.begin().await?;
    let model = ImageEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Image not found with {id} id")))?;

    product::Entity::update_many()
        .col_expr(product::Column::ImageId, Expr::value(Option::<i32>::None))
        .filter(product::Column::ImageId.eq(id))
        .exec(&txn)
        .await?;
    category::Entity::update_many()
        .col_expr(category::Column::ImageId, Expr::value(Option::<i32>::None))
        .filter(category::Column::ImageId.eq(id))
        .exec(&txn)
        .await?;
    ImageEntity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    let path = config.upload_dir.join(model.stored_name());
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove image file"),
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Resource deleted successfully" })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct ImagesQuery {
    query: Option<String>,
}

use axum::routing::get;
use axum::{
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Router,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::config::Config;
use crate::entities::image::Entity as ImageEntity;
use crate::error::{ApiError, ApiResult};

pub fn uploads_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/images/:id", get(print_image))
        .layer(Extension(db))
}

pub async fn print_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> ApiResult {
    let model = ImageEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Image not found with {id} id")))?;

    let path = config.upload_dir.join(model.stored_name());
    let file = tokio::fs::File::open(&path).await.map_err(|err| {
        warn!(path = %path.display(), error = %err, "Image row without file");
        ApiError::not_found("Not found")
    })?;

    let content_type = mime_guess::from_path(&path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let stream = ReaderStream::new(file);
    let body = axum::body::Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok((headers, body).into_response())
}

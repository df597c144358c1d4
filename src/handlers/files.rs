use super::common::map_service_error;
use crate::{auth::AuthUser, errors::ApiError, handlers::AppState};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Download a stored proforma, purchase order or receipt file
#[utoipa::path(
    get,
    path = "/api/v1/files/{key}",
    params(
        ("key" = String, Path, description = "File key as returned on the owning record")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File not found", body = crate::errors::ErrorResponse)
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state
        .services
        .file_store
        .get(&key)
        .await
        .map_err(|e| map_service_error(e.into()))?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&key))],
        bytes,
    ))
}

/// Creates the router for file download endpoints
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/*key", get(download_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("purchase_orders/a.pdf"), "application/pdf");
        assert_eq!(content_type_for("receipts/a.png"), "image/png");
        assert_eq!(content_type_for("receipts/a"), "application/octet-stream");
    }
}

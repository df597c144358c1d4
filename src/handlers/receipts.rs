use super::common::{created_response, map_service_error, success_response};
use crate::{
    auth::AuthUser, errors::ApiError, handlers::AppState, services::receipts::ReceiptUpload,
};
use axum::{
    extract::{Multipart, Path, State},
    routing::get,
    Router,
};
use tracing::info;
use uuid::Uuid;

async fn parse_receipt(mut multipart: Multipart) -> Result<ReceiptUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("receipt").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("unreadable file: {}", e)))?;
            return Ok(ReceiptUpload {
                filename,
                bytes: bytes.to_vec(),
            });
        }
    }
    Err(ApiError::BadRequest("missing 'file' part".to_string()))
}

/// Upload a receipt for reconciliation against the purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-requests/{id}/receipts",
    request_body(content_type = "multipart/form-data"),
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 201, description = "Receipt stored and reconciled", body = crate::services::receipts::ReceiptDetail),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "No purchase order yet", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn upload_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let upload = parse_receipt(multipart).await?;

    let detail = state
        .services
        .receipts
        .upload(&user, id, upload)
        .await
        .map_err(map_service_error)?;

    info!(
        "Receipt {} uploaded for purchase request {} (validated: {})",
        detail.receipt.id, id, detail.receipt.validated
    );
    Ok(created_response(detail))
}

/// List receipts uploaded for a purchase request
#[utoipa::path(
    get,
    path = "/api/v1/purchase-requests/{id}/receipts",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 200, description = "Receipts fetched", body = [crate::entities::receipt::Model]),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "receipts"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let receipts = state
        .services
        .receipts
        .list(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(receipts))
}

/// Creates the router for receipt endpoints
pub fn receipt_routes() -> Router<AppState> {
    Router::new().route("/:id/receipts", get(list_receipts).post(upload_receipt))
}

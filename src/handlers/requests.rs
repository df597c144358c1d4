use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::AppState,
    services::requests::{
        CreatePurchaseRequest, ListParams, ProformaUpload, UpdatePurchaseRequest,
    },
};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

/// Parsed multipart body of a request submission: the JSON payload plus
/// an optional proforma invoice file.
pub(crate) struct RequestSubmission {
    pub payload: CreatePurchaseRequest,
    pub proforma: Option<ProformaUpload>,
}

pub(crate) async fn parse_submission(
    mut multipart: Multipart,
) -> Result<RequestSubmission, ApiError> {
    let mut payload: Option<CreatePurchaseRequest> = None;
    let mut proforma: Option<ProformaUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("payload") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable payload: {}", e)))?;
                payload = Some(
                    serde_json::from_slice(&bytes)
                        .map_err(|e| ApiError::BadRequest(format!("invalid payload JSON: {}", e)))?,
                );
            }
            Some("proforma") => {
                let filename = field
                    .file_name()
                    .unwrap_or("proforma")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable proforma: {}", e)))?;
                proforma = Some(ProformaUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let payload =
        payload.ok_or_else(|| ApiError::BadRequest("missing 'payload' part".to_string()))?;
    Ok(RequestSubmission { payload, proforma })
}

/// Submit a new purchase request
#[utoipa::path(
    post,
    path = "/api/v1/purchase-requests",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Purchase request created", body = crate::services::requests::PurchaseRequestDetail),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a staff member", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-requests"
)]
pub async fn create_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let submission = parse_submission(multipart).await?;
    validate_input(&submission.payload)?;

    let detail = state
        .services
        .requests
        .create(&user, submission.payload, submission.proforma)
        .await
        .map_err(map_service_error)?;

    info!("Purchase request created: {}", detail.request.id);
    Ok(created_response(detail))
}

/// List purchase requests
#[utoipa::path(
    get,
    path = "/api/v1/purchase-requests",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("page" = Option<u64>, Query, description = "Page number, 1-based"),
        ("per_page" = Option<u64>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "Purchase requests fetched", body = crate::services::requests::PurchaseRequestList)
    ),
    tag = "purchase-requests"
)]
pub async fn list_purchase_requests(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let list = state
        .services
        .requests
        .list(params)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(list))
}

/// Get a purchase request with its items, approvals and purchase order
#[utoipa::path(
    get,
    path = "/api/v1/purchase-requests/{id}",
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 200, description = "Purchase request fetched", body = crate::services::requests::PurchaseRequestDetail),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-requests"
)]
pub async fn get_purchase_request(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .requests
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(detail))
}

/// Edit a pending purchase request
#[utoipa::path(
    put,
    path = "/api/v1/purchase-requests/{id}",
    request_body = UpdatePurchaseRequest,
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 200, description = "Purchase request updated", body = crate::services::requests::PurchaseRequestDetail),
        (status = 403, description = "Not the creator", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Request is no longer pending", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-requests"
)]
pub async fn update_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .requests
        .update(&user, id, payload)
        .await
        .map_err(map_service_error)?;

    info!("Purchase request updated: {}", id);
    Ok(success_response(detail))
}

/// Creates the router for purchase request endpoints
pub fn purchase_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_purchase_requests).post(create_purchase_request),
        )
        .route("/:id", get(get_purchase_request))
        .route("/:id", put(update_purchase_request))
}

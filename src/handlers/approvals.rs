use super::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::AuthUser, errors::ApiError, handlers::AppState, services::approvals::DecisionInput,
};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

/// Approve a purchase request at the caller's level
#[utoipa::path(
    post,
    path = "/api/v1/purchase-requests/{id}/approve",
    request_body = DecisionInput,
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 200, description = "Approval recorded", body = crate::services::approvals::DecisionOutcome),
        (status = 403, description = "Role cannot approve", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Out of turn, duplicate, or no longer pending", body = crate::errors::ErrorResponse)
    ),
    tag = "approvals"
)]
pub async fn approve_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionInput>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&input)?;

    let outcome = state
        .services
        .approvals
        .approve(&user, id, input)
        .await
        .map_err(map_service_error)?;

    info!("Purchase request {} approved by {}", id, user.user_id);
    Ok(success_response(outcome))
}

/// Reject a purchase request at the caller's level
#[utoipa::path(
    post,
    path = "/api/v1/purchase-requests/{id}/reject",
    request_body = DecisionInput,
    params(
        ("id" = Uuid, Path, description = "Purchase request ID")
    ),
    responses(
        (status = 200, description = "Rejection recorded", body = crate::services::approvals::DecisionOutcome),
        (status = 403, description = "Role cannot reject", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase request not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Out of turn, duplicate, or no longer pending", body = crate::errors::ErrorResponse)
    ),
    tag = "approvals"
)]
pub async fn reject_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<DecisionInput>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = payload.map(|Json(p)| p).unwrap_or_default();
    validate_input(&input)?;

    let outcome = state
        .services
        .approvals
        .reject(&user, id, input)
        .await
        .map_err(map_service_error)?;

    info!("Purchase request {} rejected by {}", id, user.user_id);
    Ok(success_response(outcome))
}

/// Creates the router for approval endpoints
pub fn approval_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/approve", post(approve_purchase_request))
        .route("/:id/reject", post(reject_purchase_request))
}

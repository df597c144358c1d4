//! OpenAPI documentation for the procurement API.

use utoipa::OpenApi;

use crate::auth::Role;
use crate::entities::{approval, purchase_order, purchase_request, receipt, request_item};
use crate::errors::ErrorResponse;
use crate::services::approvals::{DecisionInput, DecisionOutcome};
use crate::services::receipts::ReceiptDetail;
use crate::services::reconciliation::{
    Discrepancy, DiscrepancyType, ItemSnapshot, ReconciliationResult,
};
use crate::services::requests::{
    CreatePurchaseRequest, NewRequestItem, PurchaseRequestDetail, PurchaseRequestList,
    UpdatePurchaseRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::requests::create_purchase_request,
        crate::handlers::requests::list_purchase_requests,
        crate::handlers::requests::get_purchase_request,
        crate::handlers::requests::update_purchase_request,
        crate::handlers::approvals::approve_purchase_request,
        crate::handlers::approvals::reject_purchase_request,
        crate::handlers::receipts::upload_receipt,
        crate::handlers::receipts::list_receipts,
        crate::handlers::files::download_file,
    ),
    components(schemas(
        ErrorResponse,
        Role,
        purchase_request::Model,
        purchase_request::RequestStatus,
        request_item::Model,
        approval::Model,
        purchase_order::Model,
        receipt::Model,
        CreatePurchaseRequest,
        UpdatePurchaseRequest,
        NewRequestItem,
        PurchaseRequestDetail,
        PurchaseRequestList,
        DecisionInput,
        DecisionOutcome,
        ReceiptDetail,
        ReconciliationResult,
        Discrepancy,
        DiscrepancyType,
        ItemSnapshot,
    )),
    tags(
        (name = "purchase-requests", description = "Purchase request submission and editing"),
        (name = "approvals", description = "Multi-level approval workflow"),
        (name = "receipts", description = "Receipt upload and reconciliation"),
        (name = "files", description = "Stored document downloads"),
    ),
    info(
        title = "Procurement API",
        description = "Purchase-request approval workflow with purchase order generation and receipt reconciliation"
    )
)]
pub struct ApiDoc;

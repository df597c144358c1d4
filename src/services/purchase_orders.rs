//! Purchase order generation. Runs once per request, at the moment the
//! finance approval lands.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::purchase_request::RequestStatus;
use crate::entities::{purchase_order, purchase_request, request_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::extraction::{DocumentExtractor, DocumentKind};
use crate::services::notifications::{Attachment, Notification, Notifier, Recipient};
use crate::services::reconciliation::ItemSnapshot;
use crate::services::storage::{FileKind, FileStore};

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DbPool>,
    file_store: Arc<dyn FileStore>,
    extractor: DocumentExtractor,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
}

impl PurchaseOrderService {
    pub fn new(
        db: Arc<DbPool>,
        file_store: Arc<dyn FileStore>,
        extractor: DocumentExtractor,
        events: EventSender,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            file_store,
            extractor,
            events,
            notifier,
        }
    }

    /// Generates the purchase order for a fully approved request.
    ///
    /// The request row is claimed with a conditional update keyed on
    /// `status = pending` and `purchase_order_id IS NULL`, so concurrent
    /// finance approvals produce exactly one purchase order; the loser
    /// gets Conflict.
    pub async fn generate(
        &self,
        request: purchase_request::Model,
        finance: &AuthUser,
    ) -> Result<purchase_order::Model, ServiceError> {
        let items = request_item::Entity::find()
            .filter(request_item::Column::PurchaseRequestId.eq(request.id))
            .all(&*self.db)
            .await?;

        let vendor = self.resolve_vendor(&request).await;
        let snapshot: Vec<ItemSnapshot> = items
            .iter()
            .map(|item| ItemSnapshot {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let total_amount: Decimal = items.iter().map(|i| i.line_total()).sum();

        let po_id = Uuid::new_v4();
        let now = Utc::now();
        let po_number = new_po_number(request.id, request.created_at);

        let txn = self.db.begin().await?;

        let claimed = purchase_request::Entity::update_many()
            .col_expr(
                purchase_request::Column::Status,
                Expr::value(RequestStatus::Approved.to_string()),
            )
            .col_expr(
                purchase_request::Column::ApprovedBy,
                Expr::value(finance.user_id),
            )
            .col_expr(
                purchase_request::Column::PurchaseOrderId,
                Expr::value(po_id),
            )
            .col_expr(purchase_request::Column::UpdatedAt, Expr::value(now))
            .filter(purchase_request::Column::Id.eq(request.id))
            .filter(purchase_request::Column::Status.eq(RequestStatus::Pending.to_string()))
            .filter(purchase_request::Column::PurchaseOrderId.is_null())
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "purchase request is no longer pending".into(),
            ));
        }

        let po = purchase_order::ActiveModel {
            id: Set(po_id),
            purchase_request_id: Set(request.id),
            po_number: Set(po_number.clone()),
            vendor: Set(vendor.clone()),
            item_snapshot: Set(serde_json::to_value(&snapshot)?),
            total_amount: Set(total_amount),
            document_key: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(request_id = %request.id, %po_number, "purchase order generated");
        self.events
            .send_or_log(Event::RequestApproved {
                request_id: request.id,
            })
            .await;
        self.events
            .send_or_log(Event::PurchaseOrderCreated {
                request_id: request.id,
                purchase_order_id: po_id,
                po_number: po_number.clone(),
            })
            .await;

        // Rendering, archival and notification are best-effort; the
        // purchase order row is already committed.
        let document = render_document(&request, &po, &snapshot, &finance.name);
        let po_with_doc = match self
            .file_store
            .put(
                FileKind::PurchaseOrder,
                &format!("{}.txt", po_number),
                document.as_bytes(),
            )
            .await
        {
            Ok(key) => {
                let mut active: purchase_order::ActiveModel = po.clone().into();
                active.document_key = Set(Some(key));
                match active.update(&*self.db).await {
                    Ok(updated) => updated,
                    Err(e) => {
                        warn!("failed to record purchase order document key: {}", e);
                        po
                    }
                }
            }
            Err(e) => {
                warn!("failed to archive purchase order document: {}", e);
                po
            }
        };

        let notification = Notification {
            recipient: Recipient::User {
                user_id: request.created_by,
            },
            subject: format!("Purchase order {} issued", po_number),
            body: format!(
                "Your purchase request '{}' is fully approved. Purchase order {} for {:.2} has been issued to {}.",
                request.title, po_number, total_amount, vendor
            ),
            attachment: Some(Attachment::new(
                format!("{}.txt", po_number),
                document.as_bytes(),
            )),
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("failed to notify requester about purchase order: {}", e);
        }

        Ok(po_with_doc)
    }

    /// Vendor name from the proforma invoice. Falls back to the sentinel
    /// when no proforma was uploaded or nothing could be extracted.
    async fn resolve_vendor(&self, request: &purchase_request::Model) -> String {
        let Some(key) = &request.proforma_key else {
            return DocumentKind::Proforma.sentinel_party().to_string();
        };
        let bytes = match self.file_store.get(key).await {
            Ok(b) => b,
            Err(e) => {
                warn!(key, "failed to load proforma for vendor extraction: {}", e);
                return DocumentKind::Proforma.sentinel_party().to_string();
            }
        };
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        self.extractor
            .extract(&bytes, &filename, DocumentKind::Proforma)
            .await
            .party_name
    }
}

/// Order numbers are fully deterministic: the request id plus the date
/// the request was created. Re-running generation for the same request
/// always yields the same number.
fn new_po_number(request_id: Uuid, request_created_at: chrono::DateTime<Utc>) -> String {
    format!(
        "PO-{}-{}",
        request_id.simple().to_string().to_uppercase(),
        request_created_at.format("%Y%m%d")
    )
}

fn render_document(
    request: &purchase_request::Model,
    po: &purchase_order::Model,
    snapshot: &[ItemSnapshot],
    approved_by: &str,
) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("PURCHASE ORDER {}\n", po.po_number));
    doc.push_str(&format!("Date: {}\n\n", po.created_at.format("%Y-%m-%d")));
    doc.push_str(&format!("Requested by: {}\n", request.created_by));
    doc.push_str(&format!("Reference: {}\n", request.title));
    if !request.description.is_empty() {
        doc.push_str(&format!("Description: {}\n", request.description));
    }
    doc.push_str(&format!("\nVendor: {}\n\n", po.vendor));
    doc.push_str("Items:\n");
    for item in snapshot {
        doc.push_str(&format!(
            "  {} x {} @ {:.2} = {:.2}\n",
            item.quantity,
            item.description,
            item.unit_price,
            Decimal::from(item.quantity) * item.unit_price
        ));
    }
    doc.push_str(&format!("\nTotal: {:.2}\n\n", po.total_amount));
    doc.push_str("Terms: payment due within 30 days of delivery. ");
    doc.push_str("Goods must match the itemization above; discrepancies are reported on receipt.\n\n");
    doc.push_str(&format!(
        "Approved by {} on behalf of finance.\n",
        approved_by
    ));
    doc.push_str("This purchase order was generated automatically.\n");
    doc
}

//! Receipt upload and reconciliation against the purchase order.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthUser, Role};
use crate::db::DbPool;
use crate::entities::{purchase_order, purchase_request, receipt};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::extraction::{DocumentExtractor, DocumentKind};
use crate::services::notifications::{Notification, Notifier, Recipient};
use crate::services::reconciliation::{self, ItemSnapshot, ReconciliationResult};
use crate::services::storage::{FileKind, FileStore};

#[derive(Clone, Debug)]
pub struct ReceiptUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: receipt::Model,
    pub reconciliation: ReconciliationResult,
}

#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DbPool>,
    file_store: Arc<dyn FileStore>,
    extractor: DocumentExtractor,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
}

impl ReceiptService {
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

    /// Stores a receipt, extracts its fields and reconciles them against
    /// the purchase order snapshot. Discrepancies are recorded, never a
    /// reason to refuse the upload.
    pub async fn upload(
        &self,
        user: &AuthUser,
        request_id: Uuid,
        upload: ReceiptUpload,
    ) -> Result<ReceiptDetail, ServiceError> {
        let request = purchase_request::Entity::find_by_id(request_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))?;

        if user.user_id != request.created_by && user.role != Role::Finance {
            return Err(ServiceError::Forbidden(
                "only the requester or finance can upload receipts".into(),
            ));
        }

        let po = purchase_order::Entity::find()
            .filter(purchase_order::Column::PurchaseRequestId.eq(request_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict(
                    "no purchase order has been generated for this request".into(),
                )
            })?;

        let file_key = self
            .file_store
            .put(FileKind::Receipt, &upload.filename, &upload.bytes)
            .await?;

        let extracted = self
            .extractor
            .extract(&upload.bytes, &upload.filename, DocumentKind::Receipt)
            .await;

        let snapshot: Vec<ItemSnapshot> = serde_json::from_value(po.item_snapshot.clone())?;
        let result = reconciliation::validate(&extracted, &snapshot, &po.vendor, po.total_amount);

        let row = receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_request_id: Set(request_id),
            uploaded_by: Set(user.user_id),
            file_key: Set(file_key),
            extracted_data: Set(Some(serde_json::to_value(&extracted)?)),
            validated: Set(result.validated),
            discrepancies: Set(serde_json::to_value(&result.discrepancies)?),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(
            %request_id,
            receipt_id = %row.id,
            validated = result.validated,
            discrepancies = result.discrepancies.len(),
            "receipt reconciled"
        );
        self.events
            .send_or_log(Event::ReceiptValidated {
                request_id,
                receipt_id: row.id,
                validated: result.validated,
                discrepancy_count: result.discrepancies.len(),
            })
            .await;

        if !result.validated {
            let summary: Vec<String> = result
                .discrepancies
                .iter()
                .map(|d| d.message.clone())
                .collect();
            let notification = Notification {
                recipient: Recipient::Role {
                    role: Role::Finance,
                },
                subject: format!("Receipt discrepancies on {}", po.po_number),
                body: format!(
                    "A receipt uploaded for '{}' does not reconcile with purchase order {}:\n{}",
                    request.title,
                    po.po_number,
                    summary.join("\n")
                ),
                attachment: None,
            };
            if let Err(e) = self.notifier.notify(notification).await {
                warn!("failed to notify finance about discrepancies: {}", e);
            }
        }

        Ok(ReceiptDetail {
            receipt: row,
            reconciliation: result,
        })
    }

    pub async fn list(&self, request_id: Uuid) -> Result<Vec<receipt::Model>, ServiceError> {
        let exists = purchase_request::Entity::find_by_id(request_id)
            .one(&*self.db)
            .await?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "purchase request {}",
                request_id
            )));
        }

        Ok(receipt::Entity::find()
            .filter(receipt::Column::PurchaseRequestId.eq(request_id))
            .order_by_asc(receipt::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

//! Purchase request lifecycle: creation, listing and edits while the
//! request is still pending.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthUser, Role};
use crate::db::DbPool;
use crate::entities::purchase_request::RequestStatus;
use crate::entities::{approval, purchase_order, purchase_request, receipt, request_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::extraction::{DocumentExtractor, DocumentKind, ExtractedDocument};
use crate::services::notifications::{Notification, Notifier, Recipient};
use crate::services::storage::{FileKind, FileStore};

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewRequestItem {
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// May be omitted when a proforma invoice is attached; the line items
    /// are then populated from extraction.
    #[serde(default)]
    pub items: Vec<NewRequestItem>,
}

#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Option<Vec<NewRequestItem>>,
}

/// Proforma invoice uploaded alongside a new request.
#[derive(Clone, Debug)]
pub struct ProformaUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PurchaseRequestDetail {
    #[serde(flatten)]
    pub request: purchase_request::Model,
    pub items: Vec<request_item::Model>,
    pub approvals: Vec<approval::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_order: Option<purchase_order::Model>,
    pub receipts: Vec<receipt::Model>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct ListParams {
    pub status: Option<RequestStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PurchaseRequestList {
    pub requests: Vec<purchase_request::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;

/// Sum of quantity * unit price over the submitted items. The request
/// amount is always derived, never taken from the client.
pub fn compute_amount(items: &[NewRequestItem]) -> Decimal {
    items
        .iter()
        .map(|i| Decimal::from(i.quantity) * i.unit_price)
        .sum()
}

#[derive(Clone)]
pub struct PurchaseRequestService {
    db: Arc<DbPool>,
    file_store: Arc<dyn FileStore>,
    extractor: DocumentExtractor,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
}

impl PurchaseRequestService {
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

    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreatePurchaseRequest,
        proforma: Option<ProformaUpload>,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        if user.role != Role::Staff {
            return Err(ServiceError::Forbidden(
                "only staff can create purchase requests".into(),
            ));
        }
        input.validate()?;

        let proforma_key = match &proforma {
            Some(upload) => Some(
                self.file_store
                    .put(FileKind::Proforma, &upload.filename, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        // Line items may come from the payload or, when omitted, from the
        // attached proforma invoice.
        let items = if input.items.is_empty() {
            let Some(upload) = &proforma else {
                return Err(ServiceError::ValidationError(
                    "at least one item is required when no proforma invoice is attached".into(),
                ));
            };
            let doc = self
                .extractor
                .extract(&upload.bytes, &upload.filename, DocumentKind::Proforma)
                .await;
            let extracted = items_from_extraction(&doc);
            if extracted.is_empty() {
                return Err(ServiceError::ValidationError(
                    "no line items could be extracted from the proforma invoice".into(),
                ));
            }
            extracted
        } else {
            input.items.clone()
        };
        validate_items(&items)?;

        let request_id = Uuid::new_v4();
        let amount = compute_amount(&items);
        let now = Utc::now();

        let txn = self.db.begin().await?;

        purchase_request::ActiveModel {
            id: Set(request_id),
            title: Set(input.title.clone()),
            description: Set(input.description.clone()),
            amount: Set(amount),
            status: Set(RequestStatus::Pending.to_string()),
            created_by: Set(user.user_id),
            approved_by: Set(None),
            proforma_key: Set(proforma_key),
            purchase_order_id: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        insert_items(&txn, request_id, &items).await?;

        txn.commit().await?;

        info!(%request_id, amount = %amount, "purchase request created");
        self.events
            .send_or_log(Event::RequestCreated {
                request_id,
                created_by: user.user_id,
            })
            .await;

        let notification = Notification {
            recipient: Recipient::Role {
                role: Role::ManagerLevel1,
            },
            subject: format!("Purchase request awaiting approval: {}", input.title),
            body: format!(
                "{} submitted a purchase request for {:.2} and it is waiting for level 1 approval.",
                user.name, amount
            ),
            attachment: None,
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("failed to notify level 1 managers: {}", e);
        }

        self.get(request_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<PurchaseRequestDetail, ServiceError> {
        let request = purchase_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", id)))?;

        let items = request_item::Entity::find()
            .filter(request_item::Column::PurchaseRequestId.eq(id))
            .all(&*self.db)
            .await?;

        let approvals = approval::Entity::find()
            .filter(approval::Column::PurchaseRequestId.eq(id))
            .order_by_asc(approval::Column::Level)
            .all(&*self.db)
            .await?;

        let purchase_order = purchase_order::Entity::find()
            .filter(purchase_order::Column::PurchaseRequestId.eq(id))
            .one(&*self.db)
            .await?;

        let receipts = receipt::Entity::find()
            .filter(receipt::Column::PurchaseRequestId.eq(id))
            .order_by_asc(receipt::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(PurchaseRequestDetail {
            request,
            items,
            approvals,
            purchase_order,
            receipts,
        })
    }

    pub async fn list(&self, params: ListParams) -> Result<PurchaseRequestList, ServiceError> {
        let page = params.page.unwrap_or(1).max(1);
        let per_page = params
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let mut query = purchase_request::Entity::find();
        if let Some(status) = params.status {
            query = query.filter(purchase_request::Column::Status.eq(status.to_string()));
        }

        let paginator = query
            .order_by_desc(purchase_request::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let requests = paginator.fetch_page(page - 1).await?;

        Ok(PurchaseRequestList {
            requests,
            total,
            page,
            per_page,
        })
    }

    /// Edits a pending request. Only the creator may edit, and replacing
    /// the items recomputes the amount.
    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        input: UpdatePurchaseRequest,
    ) -> Result<PurchaseRequestDetail, ServiceError> {
        input.validate()?;
        if let Some(items) = &input.items {
            validate_items(items)?;
        }

        let request = purchase_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", id)))?;

        if request.created_by != user.user_id {
            return Err(ServiceError::Forbidden(
                "only the creator can edit a purchase request".into(),
            ));
        }
        if request.status() != RequestStatus::Pending {
            return Err(ServiceError::Conflict(
                "only pending purchase requests can be edited".into(),
            ));
        }

        let txn = self.db.begin().await?;

        let mut active: purchase_request::ActiveModel = request.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(items) = &input.items {
            request_item::Entity::delete_many()
                .filter(request_item::Column::PurchaseRequestId.eq(id))
                .exec(&txn)
                .await?;
            insert_items(&txn, id, items).await?;
            active.amount = Set(compute_amount(items));
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        txn.commit().await?;

        self.events
            .send_or_log(Event::RequestUpdated { request_id: id })
            .await;

        self.get(id).await
    }
}

/// Converts extracted proforma lines into request items, dropping
/// anything without a usable quantity or price.
fn items_from_extraction(doc: &ExtractedDocument) -> Vec<NewRequestItem> {
    doc.items
        .iter()
        .filter(|item| item.quantity > 0 && item.unit_price >= Decimal::ZERO)
        .map(|item| NewRequestItem {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect()
}

fn validate_items(items: &[NewRequestItem]) -> Result<(), ServiceError> {
    for item in items {
        item.validate()?;
        if item.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit price must not be negative".into(),
            ));
        }
    }
    Ok(())
}

async fn insert_items(
    txn: &sea_orm::DatabaseTransaction,
    request_id: Uuid,
    items: &[NewRequestItem],
) -> Result<(), ServiceError> {
    let models = items.iter().map(|item| request_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        purchase_request_id: Set(request_id),
        description: Set(item.description.clone()),
        quantity: Set(item.quantity),
        unit_price: Set(item.unit_price),
    });
    request_item::Entity::insert_many(models).exec(txn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(description: &str, quantity: i32, unit_price: Decimal) -> NewRequestItem {
        NewRequestItem {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn amount_is_sum_of_line_totals() {
        let items = vec![item("Mouse", 2, dec!(25.00)), item("Stand", 1, dec!(45.00))];
        assert_eq!(compute_amount(&items), dec!(95.00));
    }

    #[test]
    fn extracted_proforma_lines_become_items() {
        let doc = ExtractedDocument {
            party_name: "Acme".into(),
            items: vec![
                crate::extraction::ExtractedItem {
                    description: "Mouse".into(),
                    quantity: 2,
                    unit_price: dec!(25.00),
                },
                crate::extraction::ExtractedItem {
                    description: "Broken".into(),
                    quantity: 0,
                    unit_price: dec!(5.00),
                },
            ],
            total_amount: dec!(50.00),
            terms: None,
            raw_text_sample: String::new(),
        };
        let items = items_from_extraction(&doc);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Mouse");
        assert_eq!(compute_amount(&items), dec!(50.00));
    }

    #[test]
    fn zero_quantity_fails_validation() {
        assert!(validate_items(&[item("Mouse", 0, dec!(25.00))]).is_err());
    }

    #[test]
    fn negative_price_fails_validation() {
        assert!(validate_items(&[item("Mouse", 1, dec!(-1.00))]).is_err());
    }
}

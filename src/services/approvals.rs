//! The approval state machine.
//!
//! Manager levels 1 and 2 each record one Approval row, in either
//! order, guarded by the unique (purchase_request_id, level) index.
//! Finance is the gate, not a vote: it requires both manager approvals,
//! does not add a row of its own, and flips the request to approved
//! while generating the purchase order. A rejection by either manager
//! level is terminal.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{ApprovalLevel, AuthUser};
use crate::db::DbPool;
use crate::entities::purchase_request::RequestStatus;
use crate::entities::{approval, purchase_order, purchase_request};
use crate::errors::{is_unique_violation, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::notifications::{Notification, Notifier, Recipient};
use crate::services::purchase_orders::PurchaseOrderService;

#[derive(Clone, Debug, Default, Deserialize, Validate, ToSchema)]
pub struct DecisionInput {
    #[validate(length(max = 1000))]
    pub comments: Option<String>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DecisionOutcome {
    #[serde(flatten)]
    pub request: purchase_request::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<approval::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_order: Option<purchase_order::Model>,
}

#[derive(Clone)]
pub struct ApprovalService {
    db: Arc<DbPool>,
    events: EventSender,
    notifier: Arc<dyn Notifier>,
    purchase_orders: Arc<PurchaseOrderService>,
}

impl ApprovalService {
    pub fn new(
        db: Arc<DbPool>,
        events: EventSender,
        notifier: Arc<dyn Notifier>,
        purchase_orders: Arc<PurchaseOrderService>,
    ) -> Self {
        Self {
            db,
            events,
            notifier,
            purchase_orders,
        }
    }

    pub async fn approve(
        &self,
        user: &AuthUser,
        request_id: Uuid,
        input: DecisionInput,
    ) -> Result<DecisionOutcome, ServiceError> {
        input.validate()?;
        let level = approval_level_for(user)?;
        let request = self.load_pending(request_id).await?;
        let approvals = self.load_approvals(request_id).await?;
        check_turn(level, &approvals)?;

        if level == ApprovalLevel::Finance {
            let po = self.purchase_orders.generate(request, user).await?;
            let request = self.reload(request_id).await?;
            self.notify_requester(
                &request,
                format!("Purchase request approved: {}", request.title),
                format!(
                    "Your purchase request '{}' passed finance review and purchase order {} was issued.",
                    request.title, po.po_number
                ),
            )
            .await;
            return Ok(DecisionOutcome {
                request,
                approval: None,
                purchase_order: Some(po),
            });
        }

        let txn = self.db.begin().await?;

        let row = approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_request_id: Set(request_id),
            approver: Set(user.user_id),
            level: Set(level.number()),
            approved: Set(true),
            comments: Set(input.comments),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "level {} has already decided on this request",
                    level.number()
                ))
            } else {
                e.into()
            }
        })?;

        // Re-check inside the transaction: a rejection landing after
        // load_pending must not end up with an approved row on it.
        let claimed = purchase_request::Entity::update_many()
            .col_expr(purchase_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_request::Column::Id.eq(request_id))
            .filter(purchase_request::Column::Status.eq(RequestStatus::Pending.to_string()))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "purchase request is no longer pending".into(),
            ));
        }

        txn.commit().await?;

        info!(%request_id, level = level.number(), "approval recorded");
        self.events
            .send_or_log(Event::LevelApproved {
                request_id,
                level: level.number(),
                approver: user.user_id,
            })
            .await;

        self.notify_requester(
            &request,
            format!("Purchase request approved at level {}", level.number()),
            format!(
                "Your purchase request '{}' for {:.2} was approved at level {}.",
                request.title,
                request.amount,
                level.number()
            ),
        )
        .await;

        Ok(DecisionOutcome {
            request,
            approval: Some(row),
            purchase_order: None,
        })
    }

    pub async fn reject(
        &self,
        user: &AuthUser,
        request_id: Uuid,
        input: DecisionInput,
    ) -> Result<DecisionOutcome, ServiceError> {
        input.validate()?;
        let level = approval_level_for(user)?;
        if level == ApprovalLevel::Finance {
            return Err(ServiceError::Forbidden(
                "finance cannot reject; rejection happens at the manager levels".into(),
            ));
        }
        self.load_pending(request_id).await?;
        let approvals = self.load_approvals(request_id).await?;
        if decided_at(&approvals, level) {
            return Err(ServiceError::Conflict(format!(
                "level {} has already decided on this request",
                level.number()
            )));
        }

        let txn = self.db.begin().await?;

        let row = approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_request_id: Set(request_id),
            approver: Set(user.user_id),
            level: Set(level.number()),
            approved: Set(false),
            comments: Set(input.comments),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "level {} has already decided on this request",
                    level.number()
                ))
            } else {
                e.into()
            }
        })?;

        let claimed = purchase_request::Entity::update_many()
            .col_expr(
                purchase_request::Column::Status,
                Expr::value(RequestStatus::Rejected.to_string()),
            )
            .col_expr(purchase_request::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_request::Column::Id.eq(request_id))
            .filter(purchase_request::Column::Status.eq(RequestStatus::Pending.to_string()))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "purchase request is no longer pending".into(),
            ));
        }

        txn.commit().await?;

        info!(%request_id, level = level.number(), "purchase request rejected");
        self.events
            .send_or_log(Event::RequestRejected {
                request_id,
                level: level.number(),
                approver: user.user_id,
            })
            .await;

        let request = self.reload(request_id).await?;
        self.notify_requester(
            &request,
            format!("Purchase request rejected: {}", request.title),
            format!(
                "Your purchase request '{}' was rejected at level {}.",
                request.title,
                level.number()
            ),
        )
        .await;

        Ok(DecisionOutcome {
            request,
            approval: Some(row),
            purchase_order: None,
        })
    }

    async fn load_pending(
        &self,
        request_id: Uuid,
    ) -> Result<purchase_request::Model, ServiceError> {
        let request = self.reload(request_id).await?;
        let status = request.status();
        if status != RequestStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "purchase request is already {}",
                status
            )));
        }
        Ok(request)
    }

    async fn reload(&self, request_id: Uuid) -> Result<purchase_request::Model, ServiceError> {
        purchase_request::Entity::find_by_id(request_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase request {}", request_id)))
    }

    async fn load_approvals(&self, request_id: Uuid) -> Result<Vec<approval::Model>, ServiceError> {
        Ok(approval::Entity::find()
            .filter(approval::Column::PurchaseRequestId.eq(request_id))
            .all(&*self.db)
            .await?)
    }

    async fn notify_requester(&self, request: &purchase_request::Model, subject: String, body: String) {
        let notification = Notification {
            recipient: Recipient::User {
                user_id: request.created_by,
            },
            subject,
            body,
            attachment: None,
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("failed to notify requester: {}", e);
        }
    }
}

fn approval_level_for(user: &AuthUser) -> Result<ApprovalLevel, ServiceError> {
    user.role
        .approval_level()
        .ok_or_else(|| ServiceError::Forbidden("this role cannot approve or reject".into()))
}

fn approved_at(approvals: &[approval::Model], level: ApprovalLevel) -> bool {
    approvals
        .iter()
        .any(|a| a.level == level.number() && a.approved)
}

fn decided_at(approvals: &[approval::Model], level: ApprovalLevel) -> bool {
    approvals.iter().any(|a| a.level == level.number())
}

/// Workflow guard. Levels 1 and 2 may decide in either order, each
/// exactly once; finance needs both manager approvals in place.
fn check_turn(level: ApprovalLevel, approvals: &[approval::Model]) -> Result<(), ServiceError> {
    if decided_at(approvals, level) {
        return Err(ServiceError::Conflict(format!(
            "level {} has already decided on this request",
            level.number()
        )));
    }
    if level == ApprovalLevel::Finance
        && (!approved_at(approvals, ApprovalLevel::ManagerOne)
            || !approved_at(approvals, ApprovalLevel::ManagerTwo))
    {
        return Err(ServiceError::Conflict(
            "both prior approvals are required before finance review".into(),
        ));
    }
    Ok(())
}

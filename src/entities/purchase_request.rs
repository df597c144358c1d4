use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle of a purchase request. Pending requests accept approvals;
/// approved and rejected are terminal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, utoipa::ToSchema)]
#[schema(as = PurchaseRequest)]
#[sea_orm(table_name = "purchase_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    pub description: String,

    /// Always the sum of quantity * unit_price over the request items.
    #[serde(serialize_with = "super::money::serialize")]
    pub amount: Decimal,

    pub status: String,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,

    /// Storage key of the uploaded proforma invoice, if any.
    pub proforma_key: Option<String>,

    /// Set exactly once when the finance approval generates the purchase order.
    pub purchase_order_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> RequestStatus {
        self.status
            .parse()
            .unwrap_or(RequestStatus::Pending)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::request_item::Entity")]
    RequestItem,
    #[sea_orm(has_many = "super::approval::Entity")]
    Approval,
    #[sea_orm(has_many = "super::receipt::Entity")]
    Receipt,
}

impl Related<super::request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestItem.def()
    }
}

impl Related<super::approval::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approval.def()
    }
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_string() {
        assert_eq!(RequestStatus::Pending.to_string(), "pending");
        assert_eq!(
            "approved".parse::<RequestStatus>().unwrap(),
            RequestStatus::Approved
        );
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }
}

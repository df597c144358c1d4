//! Receipt reconciliation against the purchase order snapshot.
//!
//! Pure comparison logic: every rule is evaluated against the immutable
//! item snapshot taken at approval time, and all discrepancies are
//! collected in one pass. Reconciliation flags, it never blocks an
//! upload.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::extraction::ExtractedDocument;

/// Allowed deviation between receipt and PO totals, as a fraction of
/// the PO total. A difference of exactly the tolerance passes.
const AMOUNT_TOLERANCE_RATIO: Decimal = dec!(0.05);

/// One line of the immutable item snapshot stored on the purchase order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemSnapshot {
    pub description: String,
    pub quantity: i32,
    #[serde(serialize_with = "crate::entities::money::serialize")]
    pub unit_price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    VendorMismatch,
    AmountMismatch,
    ItemCountMismatch,
    ItemMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Discrepancy {
    #[serde(rename = "type")]
    pub kind: DiscrepancyType,
    pub message: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::entities::money::serialize_opt"
    )]
    pub receipt_amount: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::entities::money::serialize_opt"
    )]
    pub po_amount: Option<Decimal>,
}

impl Discrepancy {
    fn new(kind: DiscrepancyType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            receipt_amount: None,
            po_amount: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationResult {
    pub validated: bool,
    pub discrepancies: Vec<Discrepancy>,
}

/// Compares an extracted receipt against the purchase order. Returns
/// every discrepancy found; `validated` is true only when there are none.
pub fn validate(
    receipt: &ExtractedDocument,
    snapshot: &[ItemSnapshot],
    po_vendor: &str,
    po_total: Decimal,
) -> ReconciliationResult {
    let mut discrepancies = Vec::new();

    check_vendor(receipt, po_vendor, &mut discrepancies);
    check_amount(receipt, po_total, &mut discrepancies);
    check_items(receipt, snapshot, &mut discrepancies);

    ReconciliationResult {
        validated: discrepancies.is_empty(),
        discrepancies,
    }
}

/// Vendor names match when either contains the other, case-insensitive.
/// Only evaluated when both sides recovered a name.
fn check_vendor(receipt: &ExtractedDocument, po_vendor: &str, out: &mut Vec<Discrepancy>) {
    let receipt_vendor = receipt.party_name.trim().to_lowercase();
    let po_vendor = po_vendor.trim().to_lowercase();
    if receipt_vendor.is_empty() || po_vendor.is_empty() {
        return;
    }
    if !receipt_vendor.contains(&po_vendor) && !po_vendor.contains(&receipt_vendor) {
        out.push(Discrepancy::new(
            DiscrepancyType::VendorMismatch,
            format!(
                "receipt vendor '{}' does not match purchase order vendor '{}'",
                receipt_vendor, po_vendor
            ),
        ));
    }
}

/// Totals are compared only when both are positive; the extractor uses
/// zero as "not found".
fn check_amount(receipt: &ExtractedDocument, po_total: Decimal, out: &mut Vec<Discrepancy>) {
    if receipt.total_amount <= Decimal::ZERO || po_total <= Decimal::ZERO {
        return;
    }
    let tolerance = po_total * AMOUNT_TOLERANCE_RATIO;
    let difference = (receipt.total_amount - po_total).abs();
    if difference > tolerance {
        out.push(Discrepancy {
            kind: DiscrepancyType::AmountMismatch,
            message: format!(
                "receipt total {} differs from purchase order total {} by more than {}",
                receipt.total_amount, po_total, tolerance
            ),
            receipt_amount: Some(receipt.total_amount),
            po_amount: Some(po_total),
        });
    }
}

fn check_items(
    receipt: &ExtractedDocument,
    snapshot: &[ItemSnapshot],
    out: &mut Vec<Discrepancy>,
) {
    if receipt.items.len() != snapshot.len() {
        out.push(Discrepancy::new(
            DiscrepancyType::ItemCountMismatch,
            format!(
                "receipt lists {} items but purchase order has {}",
                receipt.items.len(),
                snapshot.len()
            ),
        ));
    }

    // Per-item presence only makes sense when both sides have items.
    if receipt.items.is_empty() || snapshot.is_empty() {
        return;
    }

    for expected in snapshot {
        let wanted = expected.description.trim().to_lowercase();
        let found = receipt.items.iter().any(|item| {
            let got = item.description.trim().to_lowercase();
            got.contains(&wanted) || wanted.contains(&got)
        });
        if !found {
            out.push(Discrepancy::new(
                DiscrepancyType::ItemMismatch,
                format!("expected item not found on receipt: {}", wanted),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractedItem;

    fn receipt(vendor: &str, total: Decimal, items: Vec<ExtractedItem>) -> ExtractedDocument {
        ExtractedDocument {
            party_name: vendor.to_string(),
            items,
            total_amount: total,
            terms: None,
            raw_text_sample: String::new(),
        }
    }

    fn item(description: &str, quantity: i32, unit_price: Decimal) -> ExtractedItem {
        ExtractedItem {
            description: description.to_string(),
            quantity,
            unit_price,
        }
    }

    fn snapshot_item(description: &str, quantity: i32, unit_price: Decimal) -> ItemSnapshot {
        ItemSnapshot {
            description: description.to_string(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn matching_receipt_validates() {
        let r = receipt("Acme Supplies", dec!(100.00), vec![item("Mouse", 2, dec!(50))]);
        let snap = vec![snapshot_item("Mouse", 2, dec!(50))];
        let result = validate(&r, &snap, "Acme", dec!(100.00));
        assert!(result.validated);
        assert!(result.discrepancies.is_empty());
    }

    #[test]
    fn amount_within_tolerance_passes() {
        // 5% of 100 is exactly 5; a 105 receipt is not a discrepancy.
        let r = receipt("Acme", dec!(105.00), vec![item("Mouse", 1, dec!(105))]);
        let snap = vec![snapshot_item("Mouse", 1, dec!(100))];
        let result = validate(&r, &snap, "Acme", dec!(100.00));
        assert!(result.validated);
    }

    #[test]
    fn amount_beyond_tolerance_is_flagged_with_both_amounts() {
        let r = receipt("Acme", dec!(106.00), vec![item("Mouse", 1, dec!(106))]);
        let snap = vec![snapshot_item("Mouse", 1, dec!(100))];
        let result = validate(&r, &snap, "Acme", dec!(100.00));
        assert!(!result.validated);
        let d = &result.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyType::AmountMismatch);
        assert_eq!(d.receipt_amount, Some(dec!(106.00)));
        assert_eq!(d.po_amount, Some(dec!(100.00)));
    }

    #[test]
    fn vendor_substring_matches_both_directions() {
        let r = receipt("ACME SUPPLIES LTD", dec!(10), vec![item("Pen", 1, dec!(10))]);
        let snap = vec![snapshot_item("Pen", 1, dec!(10))];
        assert!(validate(&r, &snap, "Acme Supplies", dec!(10)).validated);
        assert!(validate(&r, &snap, "acme supplies ltd and co", dec!(10)).validated);
    }

    #[test]
    fn missing_item_is_flagged_with_lowercased_description() {
        let r = receipt("Acme", dec!(45), vec![item("Mouse", 1, dec!(45))]);
        let snap = vec![snapshot_item("Laptop Stand", 1, dec!(45))];
        let result = validate(&r, &snap, "Acme", dec!(45));
        assert!(!result.validated);
        let messages: Vec<_> = result
            .discrepancies
            .iter()
            .filter(|d| d.kind == DiscrepancyType::ItemMismatch)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["expected item not found on receipt: laptop stand"]
        );
    }

    #[test]
    fn all_rules_are_evaluated_in_one_pass() {
        let r = receipt("Other Corp", dec!(200), vec![item("Pencil", 1, dec!(200))]);
        let snap = vec![
            snapshot_item("Laptop Stand", 1, dec!(45)),
            snapshot_item("Mouse", 1, dec!(55)),
        ];
        let result = validate(&r, &snap, "Acme", dec!(100));
        let kinds: Vec<_> = result.discrepancies.iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&DiscrepancyType::VendorMismatch));
        assert!(kinds.contains(&DiscrepancyType::AmountMismatch));
        assert!(kinds.contains(&DiscrepancyType::ItemCountMismatch));
        assert!(kinds.contains(&DiscrepancyType::ItemMismatch));
    }

    #[test]
    fn unknown_amounts_are_not_compared() {
        let r = receipt("Acme", Decimal::ZERO, vec![item("Mouse", 1, dec!(50))]);
        let snap = vec![snapshot_item("Mouse", 1, dec!(50))];
        let result = validate(&r, &snap, "Acme", dec!(100));
        assert!(result.validated);
    }
}

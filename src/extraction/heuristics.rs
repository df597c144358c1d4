//! Deterministic regex-based field extraction. Used whenever the AI
//! backend is disabled or unreachable.

use rust_decimal::Decimal;

use super::{ExtractedDocument, ExtractedItem};

const MAX_ITEMS: usize = 10;
const MAX_PARTY_LINE_CHARS: usize = 60;

macro_rules! re {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

pub fn extract(text: &str) -> ExtractedDocument {
    ExtractedDocument {
        party_name: extract_party(text).unwrap_or_default(),
        items: extract_items(text),
        total_amount: extract_total(text).unwrap_or_default(),
        terms: extract_terms(text),
        raw_text_sample: String::new(),
    }
}

/// Party name from a labelled header line, falling back to the first
/// short unlabelled line that is not itself a document-type heading.
fn extract_party(text: &str) -> Option<String> {
    let labelled = re!(r"(?im)^.*?(?:vendor|supplier|seller|store|from)\s*[:\-]\s*([^\n\r]+)");
    if let Some(caps) = labelled.captures(text) {
        let name = caps[1].trim().to_string();
        if !name.is_empty() {
            return Some(name);
        }
    }

    text.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.contains(':')
                && line.chars().count() <= MAX_PARTY_LINE_CHARS
                && !is_document_heading(line)
        })
        .map(|line| line.to_string())
}

fn is_document_heading(line: &str) -> bool {
    let heading = re!(
        r"(?i)^(?:tax\s+)?(?:invoice|receipt|quotation|quote|estimate|proforma(?:\s+invoice)?|purchase\s+order)$"
    );
    heading.is_match(line)
}

/// Total amount. When several candidate lines match (subtotal, tax,
/// total) the last one wins, which is where totals sit on receipts.
fn extract_total(text: &str) -> Option<Decimal> {
    let pattern = re!(r"(?i)(?:total|amount|sum)\s*[:\-]?\s*\$?\s*(\d[\d,]*\.?\d*)");
    pattern
        .captures_iter(text)
        .last()
        .and_then(|caps| parse_amount(&caps[1]))
}

fn extract_terms(text: &str) -> Option<String> {
    let pattern = re!(r"(?im)^\s*(?:payment\s+)?terms\s*[:\-]\s*([^\n\r]+)");
    pattern
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Line items in the common "<qty> x <description> @ $<price>" shape,
/// with the separators optional. Unparseable lines are skipped.
fn extract_items(text: &str) -> Vec<ExtractedItem> {
    let pattern = re!(r"(\d+)\s*x?\s*([A-Za-z][A-Za-z\s]*?)\s*(?:@|at)?\s*\$?(\d[\d,]*\.?\d*)");
    let mut items = Vec::new();
    for caps in pattern.captures_iter(text) {
        let Ok(quantity) = caps[1].parse::<i32>() else {
            continue;
        };
        let description = caps[2].trim().to_string();
        let Some(unit_price) = parse_amount(&caps[3]) else {
            continue;
        };
        if description.is_empty() || quantity <= 0 {
            continue;
        }
        items.push(ExtractedItem {
            description,
            quantity,
            unit_price,
        });
        if items.len() >= MAX_ITEMS {
            break;
        }
    }
    items
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    raw.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn labelled_party_wins_over_first_line() {
        let text = "ACME RECEIPT\nVendor: Acme Supplies Ltd\nTotal: $10";
        assert_eq!(extract_party(text).unwrap(), "Acme Supplies Ltd");
    }

    #[test]
    fn first_short_line_used_without_label() {
        let text = "Corner Store\n2 x Milk $3.00\nTotal: $6.00";
        assert_eq!(extract_party(text).unwrap(), "Corner Store");
    }

    #[test]
    fn document_headings_are_not_party_names() {
        let text = "INVOICE\nAcme Supplies\n2 x Mouse $25.00\nTotal: $50.00";
        assert_eq!(extract_party(text).unwrap(), "Acme Supplies");

        let text = "Tax Invoice\nProforma Invoice\nBolt Works\nTotal: $1.00";
        assert_eq!(extract_party(text).unwrap(), "Bolt Works");
    }

    #[test]
    fn last_total_line_wins() {
        let text = "Subtotal: $90.00\nTax amount: $10.00\nTotal: $100.00";
        assert_eq!(extract_total(text).unwrap(), dec!(100.00));
    }

    #[test]
    fn thousands_separators_are_handled() {
        assert_eq!(
            extract_total("Total: $1,234.56").unwrap(),
            dec!(1234.56)
        );
    }

    #[test]
    fn items_with_and_without_separators() {
        let items = extract_items("2 x Mouse @ $25.00\n10 Laptop Stand 45.00");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Mouse");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit_price, dec!(25.00));
        assert_eq!(items[1].description, "Laptop Stand");
        assert_eq!(items[1].quantity, 10);
        assert_eq!(items[1].unit_price, dec!(45.00));
    }

    #[test]
    fn item_count_is_capped() {
        let text = (0..20)
            .map(|_| "2 x Pen $1.00")
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(extract_items(&text).len(), MAX_ITEMS);
    }

    #[test]
    fn terms_line_extracted() {
        let text = "Vendor: Acme\nPayment terms: Net 30\nTotal: $5";
        assert_eq!(extract_terms(text).unwrap(), "Net 30");
    }
}

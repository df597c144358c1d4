//! Document extraction pipeline.
//!
//! Turns an uploaded proforma invoice or receipt into structured fields:
//! text recovery first (text layer, OCR), then field extraction (AI
//! backend when configured, deterministic heuristics otherwise).
//!
//! Extraction is best-effort by contract: it never fails the upload.
//! When nothing can be recovered the result is a zero-valued document
//! with a sentinel party name.

mod ai;
mod heuristics;
mod text;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AiExtractionConfig;

pub use ai::AiClient;

const RAW_TEXT_SAMPLE_CHARS: usize = 500;

/// What kind of document is being extracted. Decides the sentinel party
/// name and how the AI backend is prompted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Proforma,
    Receipt,
}

impl DocumentKind {
    /// Fallback party name when none can be recovered.
    pub fn sentinel_party(&self) -> &'static str {
        match self {
            DocumentKind::Proforma => "Unknown Vendor",
            DocumentKind::Receipt => "Unknown Seller",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            DocumentKind::Proforma => "proforma invoice",
            DocumentKind::Receipt => "receipt",
        }
    }
}

/// A line item recovered from a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Structured fields recovered from a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub party_name: String,
    pub items: Vec<ExtractedItem>,
    pub total_amount: Decimal,
    pub terms: Option<String>,
    /// Leading slice of the recovered text, kept for auditing.
    pub raw_text_sample: String,
}

impl ExtractedDocument {
    /// Zero-valued result for documents nothing could be recovered from.
    pub fn empty(kind: DocumentKind) -> Self {
        Self {
            party_name: kind.sentinel_party().to_string(),
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            terms: None,
            raw_text_sample: String::new(),
        }
    }
}

/// Extracts structured data from uploaded documents.
#[derive(Clone, Debug)]
pub struct DocumentExtractor {
    ai: Option<AiClient>,
}

impl DocumentExtractor {
    pub fn new(config: &AiExtractionConfig) -> Self {
        Self {
            ai: AiClient::from_config(config),
        }
    }

    /// Extractor with the AI backend disabled.
    pub fn heuristics_only() -> Self {
        Self { ai: None }
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
        kind: DocumentKind,
    ) -> ExtractedDocument {
        let recovered = match text::extract_text(bytes, filename).await {
            Ok(t) => t,
            Err(e) => {
                warn!(filename, "text recovery failed: {:#}", e);
                String::new()
            }
        };

        if recovered.trim().is_empty() {
            return ExtractedDocument::empty(kind);
        }

        let mut doc = match &self.ai {
            Some(client) => match client.extract(&recovered, kind.noun()).await {
                Ok(ai_doc) => ai::into_document(ai_doc),
                Err(e) => {
                    warn!("AI extraction failed, falling back to heuristics: {:#}", e);
                    heuristics::extract(&recovered)
                }
            },
            None => heuristics::extract(&recovered),
        };

        if doc.party_name.trim().is_empty() {
            doc.party_name = kind.sentinel_party().to_string();
        }
        if doc.total_amount.is_zero() {
            doc.total_amount = doc
                .items
                .iter()
                .map(|i| Decimal::from(i.quantity) * i.unit_price)
                .sum();
        }
        doc.raw_text_sample = recovered.chars().take(RAW_TEXT_SAMPLE_CHARS).collect();
        doc
    }
}

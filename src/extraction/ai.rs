//! AI-assisted field extraction over an OpenAI-compatible
//! chat-completions endpoint. Strictly optional; every failure here
//! falls back to the regex heuristics.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AiExtractionConfig;

use super::{ExtractedDocument, ExtractedItem};

/// Documents are truncated to this many characters before prompting.
const MAX_PROMPT_CHARS: usize = 3000;

#[derive(Clone, Debug)]
pub struct AiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

/// Shape the model is asked to produce. Every field is optional so a
/// partially filled response still parses.
#[derive(Debug, Serialize, Deserialize)]
pub struct AiExtraction {
    pub party_name: Option<String>,
    pub items: Option<Vec<AiItem>>,
    pub total_amount: Option<f64>,
    pub terms: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AiItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
}

impl AiClient {
    /// Builds a client when the backend is enabled, None otherwise.
    pub fn from_config(config: &AiExtractionConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
        })
    }

    pub async fn extract(&self, text: &str, document_noun: &str) -> Result<AiExtraction> {
        let truncated: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        let system = format!(
            "You extract structured data from a {}. Respond with ONLY a JSON object, \
             no prose and no code fences, with these keys: \
             \"party_name\" (string), \
             \"items\" (array of {{\"description\": string, \"quantity\": number, \"unit_price\": number}}), \
             \"total_amount\" (number), \
             \"terms\" (string or null). \
             Use null for anything you cannot find.",
            document_noun
        );

        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": truncated},
            ],
        });

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("AI backend unreachable")?;
        if !response.status().is_success() {
            bail!("AI backend returned {}", response.status());
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("AI backend returned invalid JSON")?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("AI response has no message content"))?;

        parse_model_output(content)
    }
}

/// Parses the model's reply, tolerating code fences and surrounding prose.
fn parse_model_output(content: &str) -> Result<AiExtraction> {
    let stripped = strip_code_fences(content);
    let object = extract_json_object(stripped)
        .ok_or_else(|| anyhow!("no JSON object in AI response"))?;
    serde_json::from_str(object).context("AI response JSON did not match expected shape")
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag after the opening fence.
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Returns the slice spanning the first balanced top-level JSON object.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Converts the AI response to the common document shape. Items with
/// missing or non-positive quantities are dropped.
pub fn into_document(ai: AiExtraction) -> ExtractedDocument {
    let items = ai
        .items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let quantity = item.quantity? as i32;
            if quantity <= 0 || item.description.trim().is_empty() {
                return None;
            }
            let unit_price = Decimal::try_from(item.unit_price?).ok()?;
            Some(ExtractedItem {
                description: item.description.trim().to_string(),
                quantity,
                unit_price,
            })
        })
        .collect();

    ExtractedDocument {
        party_name: ai.party_name.unwrap_or_default().trim().to_string(),
        items,
        total_amount: ai
            .total_amount
            .and_then(|v| Decimal::try_from(v).ok())
            .unwrap_or_default(),
        terms: ai.terms.filter(|t| !t.trim().is_empty()),
        raw_text_sample: String::new(),
    }
}

//! AI-assisted receipt parsing against a generative model.
//!
//! One request per attempt, no retries: a failed attempt is reported as a
//! typed fallback reason and the caller decides what to do with it (text
//! input falls back to the deterministic parser, media input degrades to an
//! empty receipt). The model's output shape is never trusted blindly — every
//! field is independently type-checked and coerced.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ResolvedEndpoint;
use crate::error::{KabalaError, Result};
use crate::model::{ParsedItem, ParsedReceipt};

/// Instruction block for text-mode extraction. Extraction semantics mirror
/// the deterministic parser.
const TEXT_PROMPT: &str = r#"You are a receipt data extraction assistant for Israeli supermarket receipts (Hebrew and English).
Given raw receipt text, extract structured data and return ONLY valid JSON.

The JSON must match this schema exactly:
{
  "storeName": "string or null (canonical chain name, e.g. שופרסל, רמי לוי)",
  "purchaseDate": "YYYY-MM-DD or null",
  "items": [
    {
      "name": "string (the item name as printed)",
      "quantity": number (1 for count-sold items, decimal kg for weight-sold items),
      "unitPrice": number or null,
      "totalPrice": number or null
    }
  ],
  "totalAmount": number or null (the amount actually paid, e.g. after סה"כ or לתשלום)
}

Notes:
- Skip discount lines (הנחה, מבצע, זיכוי), VAT lines, payment method lines and footer text; they are not items.
- Dates on Israeli receipts are day-first (DD/MM/YYYY).
- Use null for fields you cannot determine. An empty items array is acceptable.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

/// Extra instructions for multimodal mode: receipt photos carry delivery
/// metadata a text paste usually does not.
const VISION_PROMPT_EXTRA: &str = r#"
- The input is an image or scan of a receipt. Read it carefully, including Hebrew text.
- Ignore delivery addresses, order IDs, customer numbers, loyalty-club numbers and any other non-item metadata."#;

/// Content sent alongside the fixed instruction block.
#[derive(Debug, Clone)]
pub enum ModelInput {
    Text(String),
    /// Inline bytes with their mime type (image or scanned PDF).
    Inline { mime_type: String, data: Vec<u8> },
}

/// Transport seam for the generative model, so tests can stub it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request (instruction block + content) and return the raw
    /// response text. Callers impose no retries.
    async fn generate(&self, input: &ModelInput) -> Result<String>;
}

// --- Gemini wire types -----------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Production client for the Gemini generateContent API.
pub struct GeminiClient {
    http: Client,
    endpoint: ResolvedEndpoint,
}

impl GeminiClient {
    pub fn new(endpoint: ResolvedEndpoint) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    fn build_request(&self, input: &ModelInput) -> (String, GenerateRequest) {
        let (model, parts) = match input {
            ModelInput::Text(text) => (
                &self.endpoint.model,
                vec![
                    RequestPart {
                        text: Some(TEXT_PROMPT.to_string()),
                        inline_data: None,
                    },
                    RequestPart {
                        text: Some(format!("Extract the receipt data from this text:\n\n{text}")),
                        inline_data: None,
                    },
                ],
            ),
            ModelInput::Inline { mime_type, data } => (
                &self.endpoint.vision_model,
                vec![
                    RequestPart {
                        text: Some(format!("{TEXT_PROMPT}{VISION_PROMPT_EXTRA}")),
                        inline_data: None,
                    },
                    RequestPart {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.clone(),
                            data: BASE64.encode(data),
                        }),
                    },
                ],
            ),
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint.base_url, model
        );
        let request = GenerateRequest {
            contents: vec![RequestContent { parts }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };
        (url, request)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, input: &ModelInput) -> Result<String> {
        let (url, request) = self.build_request(input);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.endpoint.api_key)
            .timeout(Duration::from_secs(self.endpoint.timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KabalaError::Model(format!("API error {status}: {body}")));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .next()
            .ok_or_else(|| KabalaError::Model("no text content in response".to_string()))?;

        debug!(chars = text.len(), "Model response received");
        Ok(text)
    }
}

// --- Stage result ----------------------------------------------------------

/// Why the AI stage yielded nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Backend disabled or credentials missing; no request was made.
    NotConfigured(String),
    /// Network failure, timeout, or non-success HTTP status.
    RequestFailed(String),
    /// The response carried no parseable JSON object.
    BadJson(String),
}

/// Typed outcome of the AI stage, fed to the deterministic stage.
#[derive(Debug)]
pub enum ModelStage {
    Parsed(ParsedReceipt),
    Fallback(FallbackReason),
}

/// Run one model attempt over the given input. Never errors; failures come
/// back as `ModelStage::Fallback`.
pub async fn run_model_stage(client: &dyn ModelClient, input: &ModelInput) -> ModelStage {
    let raw = match client.generate(input).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Model request failed");
            return ModelStage::Fallback(FallbackReason::RequestFailed(e.to_string()));
        }
    };

    match parse_model_receipt(&raw) {
        Ok(receipt) => ModelStage::Parsed(receipt),
        Err(reason) => {
            warn!(reason = %reason, "Model response was not a usable receipt");
            ModelStage::Fallback(FallbackReason::BadJson(reason))
        }
    }
}

// --- Response validation / coercion ----------------------------------------

/// Parse a raw model response into a receipt: strip optional markdown
/// fences, locate the outermost JSON object, then coerce field by field.
pub fn parse_model_receipt(raw: &str) -> std::result::Result<ParsedReceipt, String> {
    let stripped = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json_str = extract_json_object(stripped)?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| format!("invalid JSON: {e}"))?;
    Ok(coerce_receipt(&value))
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding prose or reasoning tokens.
fn extract_json_object(s: &str) -> std::result::Result<&str, String> {
    let start = s.find('{').ok_or("no '{' found in model response")?;
    let end = s.rfind('}').ok_or("no '}' found in model response")?;
    if end <= start {
        return Err("malformed JSON in model response".to_string());
    }
    Ok(&s[start..=end])
}

/// Build a receipt out of whatever the model returned. Wrong-typed fields
/// become null/defaults; item entries without a non-empty name are dropped.
fn coerce_receipt(value: &Value) -> ParsedReceipt {
    let items = value
        .get("items")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(coerce_item).collect())
        .unwrap_or_default();

    ParsedReceipt {
        store_name: coerce_string(value.get("storeName")),
        purchase_date: coerce_string(value.get("purchaseDate")),
        items,
        total_amount: coerce_number(value.get("totalAmount")),
    }
}

fn coerce_item(entry: &Value) -> Option<ParsedItem> {
    let name = coerce_string(entry.get("name"))?;
    Some(ParsedItem {
        name,
        quantity: coerce_number(entry.get("quantity")).unwrap_or(1.0),
        unit_price: coerce_number(entry.get("unitPrice")),
        total_price: coerce_number(entry.get("totalPrice")),
    })
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Accept JSON numbers and numeric strings; anything else is null.
fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_response() {
        let raw = "```json\n{\"storeName\": \"שופרסל\", \"purchaseDate\": \"2026-03-01\", \"items\": [], \"totalAmount\": 42.5}\n```";
        let receipt = parse_model_receipt(raw).unwrap();
        assert_eq!(receipt.store_name.as_deref(), Some("שופרסל"));
        assert_eq!(receipt.total_amount, Some(42.5));
    }

    #[test]
    fn parses_response_with_surrounding_prose() {
        let raw = "Here is the extraction:\n{\"storeName\": null, \"items\": []}\nDone.";
        let receipt = parse_model_receipt(raw).unwrap();
        assert!(receipt.store_name.is_none());
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn wrong_typed_fields_become_null() {
        let raw = r#"{"storeName": 7, "purchaseDate": [], "totalAmount": "6.90", "items": "nope"}"#;
        let receipt = parse_model_receipt(raw).unwrap();
        assert!(receipt.store_name.is_none());
        assert!(receipt.purchase_date.is_none());
        // Numeric strings are accepted for amounts.
        assert_eq!(receipt.total_amount, Some(6.90));
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn items_without_a_name_are_dropped() {
        let raw = r#"{"items": [
            {"name": "חלב", "quantity": 2, "unitPrice": 6.9, "totalPrice": 13.8},
            {"name": "", "quantity": 1},
            {"quantity": 3},
            {"name": "במבה"}
        ]}"#;
        let receipt = parse_model_receipt(raw).unwrap();
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[0].name, "חלב");
        assert_eq!(receipt.items[0].quantity, 2.0);
        // Missing quantity defaults to 1.
        assert_eq!(receipt.items[1].name, "במבה");
        assert_eq!(receipt.items[1].quantity, 1.0);
        assert_eq!(receipt.items[1].unit_price, None);
    }

    #[test]
    fn garbage_is_a_bad_json_error() {
        assert!(parse_model_receipt("no json here").is_err());
        assert!(parse_model_receipt("}{").is_err());
    }

    #[tokio::test]
    async fn request_failure_becomes_fallback_reason() {
        struct FailingClient;
        #[async_trait]
        impl ModelClient for FailingClient {
            async fn generate(&self, _input: &ModelInput) -> Result<String> {
                Err(KabalaError::Model("boom".to_string()))
            }
        }

        let stage =
            run_model_stage(&FailingClient, &ModelInput::Text("חלב 6.90".to_string())).await;
        match stage {
            ModelStage::Fallback(FallbackReason::RequestFailed(msg)) => {
                assert!(msg.contains("boom"))
            }
            other => panic!("expected request-failed fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_model_output_becomes_fallback_reason() {
        struct ProseClient;
        #[async_trait]
        impl ModelClient for ProseClient {
            async fn generate(&self, _input: &ModelInput) -> Result<String> {
                Ok("I could not read this receipt, sorry.".to_string())
            }
        }

        let stage = run_model_stage(&ProseClient, &ModelInput::Text("x".to_string())).await;
        assert!(matches!(
            stage,
            ModelStage::Fallback(FallbackReason::BadJson(_))
        ));
    }
}

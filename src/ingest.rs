//! Public parse entry points and the try-AI-else-heuristics strategy.
//!
//! Both entry points always hand back a `ParsedReceipt`. The cheap
//! deterministic parser is the safety net for text; the model is pure upside
//! when available, never a hard dependency. Images have no deterministic
//! fallback — pixels cannot be regex-parsed — so failures there degrade to
//! the empty receipt, signaling the caller to retry or switch to text mode.

use tracing::{info, warn};

use crate::heuristics::{self, RuleSet};
use crate::llm_extract::{FallbackReason, ModelClient, ModelInput, ModelStage, run_model_stage};
use crate::model::ParsedReceipt;
use crate::pdf_extract::{self, PdfContent};

/// Which stage produced the receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSource {
    Model,
    Heuristics,
    /// Nothing usable; all-null/empty receipt.
    Empty,
}

/// A parse result with its provenance and, when the AI stage was skipped or
/// failed, the reason the pipeline moved on.
#[derive(Debug)]
pub struct ParseOutcome {
    pub receipt: ParsedReceipt,
    pub source: ParseSource,
    pub fallback: Option<FallbackReason>,
}

/// Parse raw receipt text. Tries the model when one is configured, falls
/// back to the deterministic parser on any failure. Never errors.
pub async fn parse_text(
    model: Option<&dyn ModelClient>,
    rules: &RuleSet,
    text: &str,
) -> ParseOutcome {
    let fallback = match model {
        None => FallbackReason::NotConfigured("no model client".to_string()),
        Some(client) => match run_model_stage(client, &ModelInput::Text(text.to_string())).await {
            ModelStage::Parsed(receipt) => {
                info!(items = receipt.items.len(), "Model parsed receipt text");
                return ParseOutcome {
                    receipt,
                    source: ParseSource::Model,
                    fallback: None,
                };
            }
            ModelStage::Fallback(reason) => reason,
        },
    };

    info!(reason = ?fallback, "Falling back to deterministic parsing");
    ParseOutcome {
        receipt: heuristics::parse_receipt(text, rules),
        source: ParseSource::Heuristics,
        fallback: Some(fallback),
    }
}

/// Parse media bytes (image or PDF). Text-bearing PDFs re-enter the text
/// pipeline with its full fallback chain; everything else needs the vision
/// model or degrades to the empty receipt.
pub async fn parse_media(
    model: Option<&dyn ModelClient>,
    rules: &RuleSet,
    mime_type: &str,
    bytes: &[u8],
) -> ParseOutcome {
    if mime_type == "application/pdf" {
        match pdf_extract::classify_pdf(bytes) {
            PdfContent::Text(text) => return parse_text(model, rules, &text).await,
            PdfContent::Scanned => {
                info!("Scanned PDF, sending to the vision model");
            }
            PdfContent::Unreadable(reason) => {
                warn!(reason = %reason, "Unreadable PDF");
                return ParseOutcome {
                    receipt: ParsedReceipt::empty(),
                    source: ParseSource::Empty,
                    fallback: None,
                };
            }
        }
    }

    let Some(client) = model else {
        return empty_outcome(FallbackReason::NotConfigured("no model client".to_string()));
    };

    let input = ModelInput::Inline {
        mime_type: mime_type.to_string(),
        data: bytes.to_vec(),
    };
    match run_model_stage(client, &input).await {
        ModelStage::Parsed(receipt) => {
            info!(items = receipt.items.len(), "Model parsed receipt media");
            ParseOutcome {
                receipt,
                source: ParseSource::Model,
                fallback: None,
            }
        }
        ModelStage::Fallback(reason) => {
            warn!(reason = ?reason, "Media parse failed, returning empty receipt");
            empty_outcome(reason)
        }
    }
}

fn empty_outcome(reason: FallbackReason) -> ParseOutcome {
    ParseOutcome {
        receipt: ParsedReceipt::empty(),
        source: ParseSource::Empty,
        fallback: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KabalaError, Result};
    use async_trait::async_trait;

    struct CannedClient(&'static str);

    #[async_trait]
    impl ModelClient for CannedClient {
        async fn generate(&self, _input: &ModelInput) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct DownClient;

    #[async_trait]
    impl ModelClient for DownClient {
        async fn generate(&self, _input: &ModelInput) -> Result<String> {
            Err(KabalaError::Model("503".to_string()))
        }
    }

    const RECEIPT_TEXT: &str = "שופרסל\nחלב תנובה    6.90\nסה\"כ 6.90\n";

    #[tokio::test]
    async fn model_success_wins_for_text() {
        let client = CannedClient(r#"{"storeName": "שופרסל", "items": [{"name": "חלב"}]}"#);
        let outcome = parse_text(Some(&client), &RuleSet::israeli_retail(), RECEIPT_TEXT).await;
        assert_eq!(outcome.source, ParseSource::Model);
        assert!(outcome.fallback.is_none());
        assert_eq!(outcome.receipt.items.len(), 1);
    }

    #[tokio::test]
    async fn text_falls_back_to_heuristics_when_model_is_down() {
        let outcome = parse_text(Some(&DownClient), &RuleSet::israeli_retail(), RECEIPT_TEXT).await;
        assert_eq!(outcome.source, ParseSource::Heuristics);
        assert!(matches!(
            outcome.fallback,
            Some(FallbackReason::RequestFailed(_))
        ));
        assert_eq!(outcome.receipt.store_name.as_deref(), Some("שופרסל"));
        assert_eq!(outcome.receipt.items.len(), 1);
        assert_eq!(outcome.receipt.total_amount, Some(6.90));
    }

    #[tokio::test]
    async fn text_without_any_model_uses_heuristics() {
        let outcome = parse_text(None, &RuleSet::israeli_retail(), RECEIPT_TEXT).await;
        assert_eq!(outcome.source, ParseSource::Heuristics);
        assert!(matches!(
            outcome.fallback,
            Some(FallbackReason::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn media_failure_returns_empty_receipt() {
        let outcome = parse_media(
            Some(&DownClient),
            &RuleSet::israeli_retail(),
            "image/jpeg",
            &[0xFF, 0xD8],
        )
        .await;
        assert_eq!(outcome.source, ParseSource::Empty);
        assert!(outcome.receipt.is_empty());
        assert!(outcome.fallback.is_some());
    }

    #[tokio::test]
    async fn media_without_model_is_empty_not_error() {
        let outcome =
            parse_media(None, &RuleSet::israeli_retail(), "image/png", &[0x89]).await;
        assert_eq!(outcome.source, ParseSource::Empty);
        assert!(outcome.receipt.is_empty());
    }
}

//! Contract types shared by the parsers, the resolver and the UI.
//!
//! Field names are a stable camelCase contract consumed by the UI and the
//! persistence layer; rename with care.

use serde::{Deserialize, Serialize};

/// A single extracted receipt line item.
///
/// Quantity defaults to 1 for count-sold goods and carries the decimal
/// weight for weight-sold goods (e.g. 0.45 for 450g of tomatoes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedItem {
    pub name: String,
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
}

impl ParsedItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 1.0,
            unit_price: None,
            total_price: None,
        }
    }
}

/// Best-effort parse of one receipt. Each field is independently nullable;
/// zero recognized items is a valid outcome meaning "needs manual entry".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReceipt {
    pub store_name: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub items: Vec<ParsedItem>,
    pub total_amount: Option<f64>,
}

impl ParsedReceipt {
    /// The all-null/empty receipt returned when nothing could be parsed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.store_name.is_none()
            && self.purchase_date.is_none()
            && self.items.is_empty()
            && self.total_amount.is_none()
    }
}

/// A persisted mapping from a raw receipt string to a canonical item name.
///
/// At most one row exists per (owner, normalized alias name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAlias {
    pub id: i64,
    pub owner_id: String,
    pub canonical_name: String,
    pub alias_name: String,
    pub store_name: Option<String>,
    pub confirmed: bool,
}

/// A personal- or global-catalog entry used as a fuzzy-match candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub name: String,
    pub image_url: Option<String>,
}

/// One resolved item, parallel to the `ParsedItem` it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedItem {
    pub original_name: String,
    pub matched_canonical_name: Option<String>,
    /// 0..=100. Fuzzy matches are capped below the confirmed threshold.
    pub confidence: u8,
    pub is_confirmed: bool,
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
}

impl MatchedItem {
    /// The no-match result for an item: null canonical name, confidence 0.
    pub fn unmatched(item: &ParsedItem) -> Self {
        Self {
            original_name: item.name.clone(),
            matched_canonical_name: None,
            confidence: 0,
            is_confirmed: false,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

//! Confirmation and learning loop over one parsed receipt.
//!
//! The user approves, rejects or overrides the resolver's suggestions; the
//! save step persists purchase rows and upserts aliases for everything that
//! ended up trustworthy, which is what lets the next receipt with the same
//! raw string resolve at confidence 100 without a fuzzy search.

use tracing::{info, warn};

use crate::confidence::{ALIAS_CONFIRMED_CONFIDENCE, ALIAS_SAVE_MIN, CONFIRMED_TIER};
use crate::error::Result;
use crate::matcher::match_items;
use crate::model::{MatchedItem, ParsedReceipt};
use crate::store::{AliasStore, Catalog, PurchaseStore, receipt_uid};

/// Per-receipt stage: `Input → Matching → Parsed → Saving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    Input,
    Matching,
    Parsed,
    Saving,
}

/// Per-item review state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Resolver suggestion (or no match) awaiting user action.
    UnconfirmedSuggestion,
    /// User approved the suggestion, or it came from a confirmed alias.
    Confirmed,
    /// User rejected the suggestion; back to no match.
    Rejected,
    /// User typed an explicit canonical name.
    ManuallyChanged,
}

#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub matched: MatchedItem,
    pub status: ItemStatus,
}

/// Outcome of a save: partial success is possible and reported, never
/// rolled back.
#[derive(Debug, Clone)]
pub struct SaveSummary {
    pub receipt_uid: String,
    pub purchases_saved: usize,
    pub purchase_failures: usize,
    pub aliases_saved: usize,
    pub alias_failures: usize,
}

/// One receipt moving through the confirmation loop.
#[derive(Debug)]
pub struct ReceiptReview {
    owner_id: String,
    receipt: ParsedReceipt,
    items: Vec<ReviewItem>,
    stage: ReviewStage,
}

impl ReceiptReview {
    pub fn new(owner_id: impl Into<String>, receipt: ParsedReceipt) -> Self {
        Self {
            owner_id: owner_id.into(),
            receipt,
            items: Vec::new(),
            stage: ReviewStage::Input,
        }
    }

    pub fn stage(&self) -> ReviewStage {
        self.stage
    }

    pub fn receipt(&self) -> &ParsedReceipt {
        &self.receipt
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    /// Run identity resolution over the receipt's items.
    pub fn resolve(&mut self, aliases: &dyn AliasStore, catalog: &dyn Catalog) -> Result<()> {
        self.stage = ReviewStage::Matching;
        let matched = match_items(
            aliases,
            catalog,
            &self.owner_id,
            &self.receipt.items,
            self.receipt.store_name.as_deref(),
        )?;
        self.items = matched
            .into_iter()
            .map(|m| {
                let status = if m.is_confirmed && m.confidence >= CONFIRMED_TIER {
                    ItemStatus::Confirmed
                } else {
                    ItemStatus::UnconfirmedSuggestion
                };
                ReviewItem { matched: m, status }
            })
            .collect();
        self.stage = ReviewStage::Parsed;
        Ok(())
    }

    /// Approve the current suggestion: confidence 100, canonical unchanged.
    /// No-op when the item has no candidate to approve.
    pub fn approve(&mut self, index: usize) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        if item.matched.matched_canonical_name.is_none() {
            warn!(index, "Approve ignored: item has no candidate");
            return;
        }
        item.matched.is_confirmed = true;
        item.matched.confidence = ALIAS_CONFIRMED_CONFIDENCE;
        item.status = ItemStatus::Confirmed;
    }

    /// Reject the suggestion: canonical name and confidence cleared.
    pub fn reject(&mut self, index: usize) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        item.matched.matched_canonical_name = None;
        item.matched.confidence = 0;
        item.matched.is_confirmed = false;
        item.status = ItemStatus::Rejected;
    }

    /// Explicit canonical-name override, confirmed at confidence 100.
    pub fn change(&mut self, index: usize, canonical_name: &str) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        item.matched.matched_canonical_name = Some(canonical_name.to_string());
        item.matched.is_confirmed = true;
        item.matched.confidence = ALIAS_CONFIRMED_CONFIDENCE;
        item.status = ItemStatus::ManuallyChanged;
    }

    /// Persist purchase rows, then upsert an alias for every item with final
    /// confidence ≥ 50 and a canonical name. Alias failures are logged and
    /// counted but never roll back the purchases already written.
    pub fn save(
        &mut self,
        purchases: &dyn PurchaseStore,
        aliases: &dyn AliasStore,
    ) -> SaveSummary {
        self.stage = ReviewStage::Saving;
        let uid = receipt_uid(&self.owner_id, &self.receipt);
        let store_name = self.receipt.store_name.as_deref();
        let purchase_date = self.receipt.purchase_date.as_deref();

        let mut summary = SaveSummary {
            receipt_uid: uid.clone(),
            purchases_saved: 0,
            purchase_failures: 0,
            aliases_saved: 0,
            alias_failures: 0,
        };

        for item in &self.items {
            match purchases.record_purchase(&self.owner_id, &uid, store_name, purchase_date, &item.matched)
            {
                Ok(_) => summary.purchases_saved += 1,
                Err(e) => {
                    warn!(error = %e, item = %item.matched.original_name, "Purchase row failed");
                    summary.purchase_failures += 1;
                }
            }
        }

        for item in &self.items {
            let m = &item.matched;
            let Some(canonical) = m.matched_canonical_name.as_deref() else {
                continue;
            };
            if m.confidence < ALIAS_SAVE_MIN {
                continue;
            }
            match aliases.upsert_alias(
                &self.owner_id,
                &m.original_name,
                canonical,
                store_name,
                m.is_confirmed,
            ) {
                Ok(()) => summary.aliases_saved += 1,
                Err(e) => {
                    warn!(error = %e, alias = %m.original_name, "Alias upsert failed");
                    summary.alias_failures += 1;
                }
            }
        }

        info!(
            receipt_uid = %summary.receipt_uid,
            purchases = summary.purchases_saved,
            aliases = summary.aliases_saved,
            "Receipt saved"
        );
        summary
    }
}

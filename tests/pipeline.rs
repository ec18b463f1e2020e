//! End-to-end: raw Hebrew receipt text through parsing, identity resolution,
//! user review and the learning loop, with no model configured.

use kabala::confidence::CONFIRMED_TIER;
use kabala::ingest::{self, ParseSource};
use kabala::review::{ItemStatus, ReceiptReview};
use kabala::store::SqliteStore;
use kabala::RuleSet;

const RECEIPT: &str = "\
שופרסל דיל רחובות
01/03/2026 14:22
--------------------------------
חלב תנובה 3% 1 ליטר    6.90
עגבניות 0.450 ק\"ג X 7.90 3.56
במבה אסם    4.50
הנחת מועדון    -1.00
--------------------------------
סה\"כ לתשלום 13.96
";

#[tokio::test]
async fn receipt_flows_from_text_to_learned_aliases() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.add_list_item("u1", "במבה", None).unwrap();
    let rules = RuleSet::israeli_retail();

    let outcome = ingest::parse_text(None, &rules, RECEIPT).await;
    assert_eq!(outcome.source, ParseSource::Heuristics);
    let receipt = &outcome.receipt;
    assert_eq!(receipt.store_name.as_deref(), Some("שופרסל"));
    assert_eq!(receipt.purchase_date.as_deref(), Some("2026-03-01"));
    assert_eq!(receipt.total_amount, Some(13.96));
    assert_eq!(receipt.items.len(), 3);

    let mut review = ReceiptReview::new("u1", outcome.receipt);
    review.resolve(&store, &store).unwrap();

    // "במבה אסם" fuzzy-matches the catalog entry as a suggestion.
    let bamba = review
        .items()
        .iter()
        .position(|i| i.matched.original_name == "במבה אסם")
        .unwrap();
    assert_eq!(review.items()[bamba].status, ItemStatus::UnconfirmedSuggestion);
    assert_eq!(
        review.items()[bamba].matched.matched_canonical_name.as_deref(),
        Some("במבה")
    );
    let suggested = review.items()[bamba].matched.confidence;
    assert!(suggested > 0 && suggested < CONFIRMED_TIER);

    // The user approves one suggestion and renames another item by hand.
    review.approve(bamba);
    let milk = review
        .items()
        .iter()
        .position(|i| i.matched.original_name.starts_with("חלב תנובה"))
        .unwrap();
    review.change(milk, "חלב");

    let summary = review.save(&store, &store);
    assert_eq!(summary.purchases_saved, 3);
    assert_eq!(summary.purchase_failures, 0);
    assert_eq!(summary.aliases_saved, 2);

    // The learned aliases resolve the same raw strings exactly next time.
    let outcome = ingest::parse_text(None, &rules, RECEIPT).await;
    let mut next = ReceiptReview::new("u1", outcome.receipt);
    next.resolve(&store, &store).unwrap();

    for (raw, canonical) in [("במבה אסם", "במבה"), ("חלב תנובה 3% 1 ליטר", "חלב")] {
        let item = next
            .items()
            .iter()
            .find(|i| i.matched.original_name == raw)
            .unwrap();
        assert_eq!(item.matched.matched_canonical_name.as_deref(), Some(canonical));
        assert_eq!(item.matched.confidence, 100);
        assert_eq!(item.status, ItemStatus::Confirmed);
    }

    // Another user's view stays untouched.
    let outcome = ingest::parse_text(None, &rules, RECEIPT).await;
    let mut other = ReceiptReview::new("u2", outcome.receipt);
    other.resolve(&store, &store).unwrap();
    assert!(other
        .items()
        .iter()
        .all(|i| !i.matched.is_confirmed || i.matched.confidence < 100));
}

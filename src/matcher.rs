//! Item identity resolution: raw receipt strings to canonical item names.
//!
//! Resolution order per item, first success wins: exact alias lookup, fuzzy
//! match against the personal then global catalog, no match. Output is
//! parallel to the input — same length, same order — so the UI can render
//! suggestions in receipt order.

use tracing::debug;

use crate::confidence::{
    ALIAS_CONFIRMED_CONFIDENCE, ALIAS_UNCONFIRMED_CONFIDENCE, CANDIDATE_KEEP,
    FUZZY_CONFIDENCE_SCALE, GLOBAL_SAMPLE_LIMIT, GLOBAL_SCALE, IMAGE_BONUS, PERSONAL_SUFFICIENT,
    SIMILARITY_ACCEPT, SIMILARITY_FLOOR, WORD_OVERLAP_SCALE,
};
use crate::error::Result;
use crate::model::{CatalogItem, MatchedItem, ParsedItem};
use crate::store::{AliasStore, Catalog};

/// Canonical form for comparisons: lowercased, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Name similarity in [0, 1], shared with prefix/autocomplete lookups.
///
/// Word-level rather than edit distance: Hebrew product names reorder words
/// more than character-level distance tolerates. Inputs are expected to be
/// normalized already.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Containment either direction: base 0.5 plus a length-ratio bonus, so
    // "במבה" inside "במבה אסם" scores higher than inside a long description.
    if a.contains(b) || b.contains(a) {
        let (shorter, longer) = if a.chars().count() <= b.chars().count() {
            (a, b)
        } else {
            (b, a)
        };
        let ratio = shorter.chars().count() as f64 / longer.chars().count() as f64;
        return 0.5 + 0.1 * ratio;
    }

    // Word overlap: fraction of the shorter name's words found, by equality
    // or substring, in the other name.
    let a_words: Vec<&str> = a.split(' ').collect();
    let b_words: Vec<&str> = b.split(' ').collect();
    let (fewer, other) = if a_words.len() <= b_words.len() {
        (&a_words, b)
    } else {
        (&b_words, a)
    };
    let found = fewer.iter().filter(|word| other.contains(**word)).count();
    (found as f64 / fewer.len() as f64) * WORD_OVERLAP_SCALE
}

/// A scored fuzzy candidate.
#[derive(Debug, Clone)]
struct Candidate {
    canonical_name: String,
    score: f64,
}

/// Resolve extracted items to canonical identities for one owner.
///
/// `store_name_hint` is carried for diagnostics; the learning loop tags the
/// aliases it persists with the detected store instead.
pub fn match_items(
    aliases: &dyn AliasStore,
    catalog: &dyn Catalog,
    owner_id: &str,
    items: &[ParsedItem],
    store_name_hint: Option<&str>,
) -> Result<Vec<MatchedItem>> {
    debug!(
        owner = owner_id,
        items = items.len(),
        store = ?store_name_hint,
        "Resolving item identities"
    );

    // Candidate sets are loaded lazily, at most once per call.
    let mut personal: Option<Vec<CatalogItem>> = None;
    let mut global: Option<Vec<CatalogItem>> = None;

    let mut matched = Vec::with_capacity(items.len());
    for item in items {
        // 1. Exact alias lookup.
        if let Some(alias) = aliases.find_alias_exact(owner_id, &item.name)? {
            let confidence = if alias.confirmed {
                ALIAS_CONFIRMED_CONFIDENCE
            } else {
                ALIAS_UNCONFIRMED_CONFIDENCE
            };
            matched.push(MatchedItem {
                original_name: item.name.clone(),
                matched_canonical_name: Some(alias.canonical_name),
                confidence,
                is_confirmed: alias.confirmed,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            });
            continue;
        }

        // 2. Fuzzy match, personal catalog first.
        if personal.is_none() {
            personal = Some(catalog.personal_items(owner_id)?);
        }
        let needle = normalize_name(&item.name);
        let mut candidates = score_personal(&needle, personal.as_deref().unwrap_or(&[]));

        let best_personal = candidates.first().map(|c| c.score).unwrap_or(0.0);
        if best_personal < PERSONAL_SUFFICIENT {
            if global.is_none() {
                global = Some(catalog.global_catalog_sample(GLOBAL_SAMPLE_LIMIT)?);
            }
            candidates.extend(score_global(&needle, global.as_deref().unwrap_or(&[])));
            sort_candidates(&mut candidates);
        }

        candidates.retain(|c| c.score >= SIMILARITY_FLOOR);
        candidates.truncate(CANDIDATE_KEEP);

        match candidates.into_iter().next() {
            Some(best) if best.score >= SIMILARITY_ACCEPT => {
                let confidence = (best.score * FUZZY_CONFIDENCE_SCALE).round().min(100.0) as u8;
                debug!(
                    name = %item.name,
                    canonical = %best.canonical_name,
                    confidence,
                    "Fuzzy match"
                );
                matched.push(MatchedItem {
                    original_name: item.name.clone(),
                    matched_canonical_name: Some(best.canonical_name),
                    confidence,
                    is_confirmed: false,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                });
            }
            // 3. No match.
            _ => matched.push(MatchedItem::unmatched(item)),
        }
    }

    Ok(matched)
}

fn score_personal(needle: &str, items: &[CatalogItem]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = items
        .iter()
        .map(|item| {
            let mut score = similarity(needle, &normalize_name(&item.name));
            if item.image_url.is_some() {
                score += IMAGE_BONUS;
            }
            Candidate {
                canonical_name: item.name.clone(),
                score,
            }
        })
        .collect();
    sort_candidates(&mut candidates);
    candidates
}

fn score_global(needle: &str, items: &[CatalogItem]) -> Vec<Candidate> {
    items
        .iter()
        .map(|item| Candidate {
            canonical_name: item.name.clone(),
            score: similarity(needle, &normalize_name(&item.name)) * GLOBAL_SCALE,
        })
        .collect()
}

fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

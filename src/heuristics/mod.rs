//! Deterministic structural parser for Israeli supermarket receipts.
//!
//! Best-effort by design: absence of a recognizable field yields `None`,
//! never an error, and zero recognized items is a valid outcome. This is the
//! safety net under the AI-assisted parser.

mod items;
pub mod rules;

pub use rules::{RuleSet, StoreRule};

use crate::model::ParsedReceipt;

/// Parse raw receipt text against a rule set. Pure and total: the same text
/// always yields the same receipt, and nothing here can fail.
pub fn parse_receipt(text: &str, rules: &RuleSet) -> ParsedReceipt {
    ParsedReceipt {
        store_name: detect_store(text, rules),
        purchase_date: extract_date(text, rules),
        items: items::extract_items(text, rules),
        total_amount: extract_total(text, rules),
    }
}

/// First store rule (in list order) matching anywhere in the text wins.
/// Priority is list order, not pattern length or specificity.
fn detect_store(text: &str, rules: &RuleSet) -> Option<String> {
    rules
        .store_rules
        .iter()
        .find(|rule| rule.pattern.is_match(text))
        .map(|rule| rule.name.clone())
}

/// Scan lines top-to-bottom; the first line with a valid date wins. Within a
/// line an ISO `YYYY-MM-DD` match is preferred over a `DD/MM/YYYY` shape.
fn extract_date(text: &str, rules: &RuleSet) -> Option<String> {
    for line in text.lines() {
        if let Some(caps) = rules.iso_date.captures(line) {
            let year: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            if let Some(date) = format_date(year, month, day) {
                return Some(date);
            }
        }
        if let Some(caps) = rules.dmy_date.captures(line) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let mut year: u32 = caps[3].parse().ok()?;
            if caps[3].len() == 2 {
                year += 2000;
            }
            if let Some(date) = format_date(year, month, day) {
                return Some(date);
            }
        }
    }
    None
}

/// Render a validated date: month in [1,12], day in [1,31].
fn format_date(year: u32, month: u32, day: u32) -> Option<String> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Scan lines bottom-to-top (totals sit near the receipt end); test the
/// ordered total-label patterns per line, first numeric match > 0 wins.
fn extract_total(text: &str, rules: &RuleSet) -> Option<f64> {
    for line in text.lines().rev() {
        for pattern in &rules.total_patterns {
            if let Some(caps) = pattern.captures(line) {
                if let Some(amount) = parse_amount(&caps[1]) {
                    if amount > 0.0 {
                        return Some(amount);
                    }
                }
            }
        }
    }
    None
}

/// Parse a price token, tolerating thousands separators.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

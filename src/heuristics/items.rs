//! Item-line extraction: an ordered cascade of line shapes with guards.
//!
//! Non-matching lines are silently dropped; discount lines are excluded
//! outright even when they are numerically shaped like an item.

use tracing::trace;

use super::rules::RuleSet;
use super::parse_amount;
use crate::model::ParsedItem;

/// Guard for the "three bare numbers" shape: quantities of 100+ are almost
/// always barcodes or register codes, not purchases.
const BARE_QTY_MIN: f64 = 1.0;
const BARE_QTY_MAX: f64 = 100.0;

/// Guards for the "trailing price" shape.
const TRAILING_PRICE_MAX: f64 = 10_000.0;
const TRAILING_NAME_MIN_CHARS: usize = 1;

pub(super) fn extract_items(text: &str, rules: &RuleSet) -> Vec<ParsedItem> {
    let mut items = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if rules.is_discount(line) {
            trace!(line, "discount line excluded");
            continue;
        }
        if rules.is_noise(line) {
            continue;
        }
        if let Some(item) = extract_item(line, rules) {
            items.push(item);
        }
    }

    items
}

/// Ordered cascade: first matching shape whose guards pass wins.
fn extract_item(line: &str, rules: &RuleSet) -> Option<ParsedItem> {
    // 1. Weight-sold: name <decimal kg> ק"ג x <price/kg> <total>
    if let Some(caps) = rules.weight_line.captures(line) {
        let qty = parse_amount(&caps["qty"])?;
        return Some(ParsedItem {
            name: caps["name"].trim().to_string(),
            quantity: qty,
            unit_price: parse_amount(&caps["unit"]),
            total_price: parse_amount(&caps["total"]),
        });
    }

    // 2. Count × unit price
    if let Some(caps) = rules.count_line.captures(line) {
        let qty = parse_amount(&caps["qty"])?;
        return Some(ParsedItem {
            name: caps["name"].trim().to_string(),
            quantity: qty,
            unit_price: parse_amount(&caps["unit"]),
            total_price: parse_amount(&caps["total"]),
        });
    }

    // 3. Three bare numbers, guarded against false positives
    if let Some(caps) = rules.bare_numbers_line.captures(line) {
        let qty = parse_amount(&caps["qty"])?;
        if (BARE_QTY_MIN..BARE_QTY_MAX).contains(&qty) {
            return Some(ParsedItem {
                name: caps["name"].trim().to_string(),
                quantity: qty,
                unit_price: parse_amount(&caps["unit"]),
                total_price: parse_amount(&caps["total"]),
            });
        }
        // Shape matched but the guard failed: drop the line, do not let a
        // later shape reinterpret a rejected quantity as a price.
        return None;
    }

    // 4. Trailing price with a ≥2-space gap
    if let Some(caps) = rules.trailing_price_line.captures(line) {
        let name = caps["name"].trim();
        let price = parse_amount(&caps["price"])?;
        if price > 0.0 && price < TRAILING_PRICE_MAX && name.chars().count() > TRAILING_NAME_MIN_CHARS
        {
            return Some(ParsedItem {
                name: name.to_string(),
                quantity: 1.0,
                unit_price: Some(price),
                total_price: Some(price),
            });
        }
        return None;
    }

    // 5. Tab-delimited: last field is the price, an optional numeric
    //    penultimate field is the quantity, the rest is the name.
    if line.contains('\t') {
        return extract_tab_item(line);
    }

    None
}

fn extract_tab_item(line: &str) -> Option<ParsedItem> {
    let fields: Vec<&str> = line
        .split('\t')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fields.len() < 2 {
        return None;
    }

    let price = parse_amount(fields.last()?)?;
    if price <= 0.0 {
        return None;
    }

    let mut name_end = fields.len() - 1;
    let mut quantity = 1.0;
    if fields.len() >= 3 {
        if let Some(qty) = parse_amount(fields[fields.len() - 2]) {
            quantity = qty;
            name_end -= 1;
        }
    }

    let name = fields[..name_end].join(" ");
    if name.is_empty() {
        return None;
    }

    Some(ParsedItem {
        name,
        quantity,
        unit_price: None,
        total_price: Some(price),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(text: &str) -> Vec<ParsedItem> {
        extract_items(text, &RuleSet::israeli_retail())
    }

    #[test]
    fn weight_sold_line_keeps_decimal_quantity() {
        let got = items("עגבניות 0.450 ק\"ג X 7.90 3.56\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "עגבניות");
        assert_eq!(got[0].quantity, 0.45);
        assert_eq!(got[0].unit_price, Some(7.90));
        assert_eq!(got[0].total_price, Some(3.56));
    }

    #[test]
    fn count_times_unit_line() {
        let got = items("יוגורט דנונה 3 x 4.20 12.60\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "יוגורט דנונה");
        assert_eq!(got[0].quantity, 3.0);
        assert_eq!(got[0].unit_price, Some(4.20));
        assert_eq!(got[0].total_price, Some(12.60));
    }

    #[test]
    fn three_bare_numbers_line() {
        let got = items("לחם אחיד 2 5.90 11.80\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].quantity, 2.0);
        assert_eq!(got[0].unit_price, Some(5.90));
        assert_eq!(got[0].total_price, Some(11.80));
    }

    #[test]
    fn bare_numbers_with_huge_quantity_is_dropped() {
        assert!(items("פריט 7290001234 1.00 5.90\n").is_empty());
        assert!(items("פריט 100 1.00 5.90\n").is_empty());
        // 99 is still within the guard.
        assert_eq!(items("פריט 99 1.00 99.00\n").len(), 1);
    }

    #[test]
    fn trailing_price_line_defaults_quantity_to_one() {
        let got = items("חלב תנובה 3% 1 ליטר    6.90\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "חלב תנובה 3% 1 ליטר");
        assert_eq!(got[0].quantity, 1.0);
        assert_eq!(got[0].unit_price, Some(6.90));
        assert_eq!(got[0].total_price, Some(6.90));
    }

    #[test]
    fn trailing_price_guards_reject_bad_lines() {
        // Single-character name
        assert!(items("א    6.90\n").is_empty());
        // Price out of range
        assert!(items("טלויזיה    19999.00\n").is_empty());
    }

    #[test]
    fn tab_delimited_line_with_quantity() {
        let got = items("קפה עלית\t2\t24.90\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "קפה עלית");
        assert_eq!(got[0].quantity, 2.0);
        assert_eq!(got[0].total_price, Some(24.90));
    }

    #[test]
    fn tab_delimited_line_without_quantity() {
        let got = items("שוקולד פרה\t7.10\n");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "שוקולד פרה");
        assert_eq!(got[0].quantity, 1.0);
        assert_eq!(got[0].total_price, Some(7.10));
    }

    #[test]
    fn discount_lines_are_never_items() {
        // Numerically shaped like a trailing-price item, still excluded.
        assert!(items("הנחת מועדון    2.00\n").is_empty());
        assert!(items("מבצע 2 5.90 11.80\n").is_empty());
    }

    #[test]
    fn noise_and_total_lines_are_skipped() {
        let text = "שופרסל\n--------\nסה\"כ 6.90\nמע\"מ 17%\nתודה ולהתראות\n";
        assert!(items(text).is_empty());
    }
}

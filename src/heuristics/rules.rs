//! Injectable pattern tables for the structural parser.
//!
//! All tables are ordered: first match in list order wins. The built-in set
//! targets Israeli retail receipts; tests substitute their own rule sets.

use regex::Regex;

/// (pattern, canonical chain name) pair for store detection.
#[derive(Debug, Clone)]
pub struct StoreRule {
    pub pattern: Regex,
    pub name: String,
}

impl StoreRule {
    pub fn new(pattern: &str, name: &str) -> Self {
        Self {
            pattern: compile(pattern),
            name: name.to_string(),
        }
    }
}

/// Compiled, immutable rule set driving `parse_receipt`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Ordered store-chain detectors, tested against the whole text.
    pub store_rules: Vec<StoreRule>,
    /// Structural noise: lines matching any of these are never items.
    pub skip_patterns: Vec<Regex>,
    /// Ordered "total" label patterns; capture group 1 is the amount.
    pub total_patterns: Vec<Regex>,
    /// Lines containing any of these are discounts, never items.
    pub discount_markers: Vec<Regex>,
    /// Shape 1: `name <decimal qty> ק"ג x <unit> <total>`.
    pub weight_line: Regex,
    /// Shape 2: `name <int qty> x <unit> <total>`.
    pub count_line: Regex,
    /// Shape 3: `name <int qty> <unit> <total>`.
    pub bare_numbers_line: Regex,
    /// Shape 4: `name␣␣<price>` with a ≥2-space gap.
    pub trailing_price_line: Regex,
    /// ISO date, preferred within a line.
    pub iso_date: Regex,
    /// `DD/MM/YYYY`-shaped date, validated by the caller.
    pub dmy_date: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in rule pattern must compile")
}

impl RuleSet {
    /// The built-in rule set for Israeli supermarket receipts.
    pub fn israeli_retail() -> Self {
        let store_rules = vec![
            StoreRule::new(r"שופרסל|(?i)shufersal", "שופרסל"),
            StoreRule::new(r"רמי\s*לוי|(?i)rami\s*levy", "רמי לוי"),
            StoreRule::new(r"יינות\s*ביתן", "יינות ביתן"),
            StoreRule::new(r"ויקטורי|(?i)victory", "ויקטורי"),
            StoreRule::new(r"טיב\s*טעם", "טיב טעם"),
            StoreRule::new(r"יוחננוף", "יוחננוף"),
            StoreRule::new(r"אושר\s*עד", "אושר עד"),
            StoreRule::new(r"חצי\s*חינם", "חצי חינם"),
            StoreRule::new(r"מחסני\s*השוק", "מחסני השוק"),
            StoreRule::new(r"סופר\s*פארם|(?i)super-?pharm", "סופר פארם"),
            StoreRule::new(r"(?i)am\s*:\s*pm", "am:pm"),
            StoreRule::new(r"מגה", "מגה"),
        ];

        let skip_patterns = vec![
            // Separator / decoration lines
            compile(r"^[\s\-=_*.#]+$"),
            // VAT labels
            compile(r#"מע["״׳']?מ"#),
            // Business registration numbers
            compile(r#"(ע\.?\s?מ|ח\.?\s?פ|עוסק\s+מורשה)\.?\s*:?\s*\d"#),
            // Phone / fax / address
            compile(r"(?i)(טלפון|טל[:.']|פקס|tel[:.]|fax)"),
            compile(r"\b0\d{1,2}-?\d{7}\b"),
            compile(r#"(רחוב|רח['׳]|שדרות|שד['׳]|כתובת)"#),
            // Payment method / transaction plumbing
            compile(r"(מזומן|אשראי|ויזה|ישראכרט|מאסטרקארד|כרטיס|שולם|עודף)"),
            // Cashier / register headers
            compile(r"(קופה|קופאי)"),
            // Thank-you footers
            compile(r"(תודה|להתראות|שמחנו)"),
            // Bare timestamps
            compile(r"^\d{1,2}:\d{2}(:\d{2})?$"),
        ];

        let total_patterns = vec![
            compile(r#"סה["״׳']?\s?כ\s+לתשלום\D*?([\d,]+(?:\.\d{1,2})?)"#),
            compile(r#"סה["״׳']?\s?כ\D*?([\d,]+(?:\.\d{1,2})?)"#),
            compile(r"לתשלום\D*?([\d,]+(?:\.\d{1,2})?)"),
            compile(r"(?i)total\D*?([\d,]+(?:\.\d{1,2})?)"),
        ];

        let discount_markers = vec![
            compile(r"הנחה"),
            compile(r"מבצע"),
            compile(r"זיכוי"),
            compile(r"מועדון"),
            compile(r"(?i)discount"),
        ];

        Self {
            store_rules,
            skip_patterns,
            total_patterns,
            discount_markers,
            weight_line: compile(
                r#"^(?P<name>.+?)\s+(?P<qty>\d+\.\d+)\s*ק["״׳']ג\s*[xX×]\s*(?P<unit>\d+(?:\.\d{1,2})?)\s+(?P<total>\d+(?:\.\d{1,2})?)\s*$"#,
            ),
            count_line: compile(
                r"^(?P<name>.+?)\s+(?P<qty>\d+)\s*[xX×]\s*(?P<unit>\d+(?:\.\d{1,2})?)\s+(?P<total>\d+(?:\.\d{1,2})?)\s*$",
            ),
            bare_numbers_line: compile(
                r"^(?P<name>.+?)\s+(?P<qty>\d+)\s+(?P<unit>\d+(?:\.\d{1,2})?)\s+(?P<total>\d+(?:\.\d{1,2})?)\s*$",
            ),
            trailing_price_line: compile(r"^(?P<name>.+?)\s{2,}(?P<price>\d+(?:\.\d{1,2})?)\s*$"),
            iso_date: compile(r"\b(\d{4})-(\d{2})-(\d{2})\b"),
            dmy_date: compile(r"\b(\d{1,2})[./-](\d{1,2})[./-](\d{4}|\d{2})\b"),
        }
    }

    /// True when the line matches any discount marker.
    pub fn is_discount(&self, line: &str) -> bool {
        self.discount_markers.iter().any(|re| re.is_match(line))
    }

    /// True when the line is structural noise or an already-consumed total.
    pub fn is_noise(&self, line: &str) -> bool {
        self.skip_patterns.iter().any(|re| re.is_match(line))
            || self.total_patterns.iter().any(|re| re.is_match(line))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::israeli_retail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_rule_order_is_priority() {
        let rules = RuleSet::israeli_retail();
        // "מגה" is deliberately last so it cannot shadow more specific chains.
        assert_eq!(rules.store_rules.last().unwrap().name, "מגה");
    }

    #[test]
    fn noise_covers_vat_and_payment_lines() {
        let rules = RuleSet::israeli_retail();
        assert!(rules.is_noise("מע\"מ 17%"));
        assert!(rules.is_noise("אשראי ויזה 1234"));
        assert!(rules.is_noise("--------------------"));
        assert!(rules.is_noise("12:34:56"));
        assert!(!rules.is_noise("חלב תנובה 3%"));
    }

    #[test]
    fn discount_markers_match_club_deals() {
        let rules = RuleSet::israeli_retail();
        assert!(rules.is_discount("הנחת מועדון -2.00"));
        assert!(rules.is_discount("מבצע 2 ב-10"));
        assert!(!rules.is_discount("במבה אסם"));
    }
}

//! Matching policy constants and the UI confidence-tier contract.
//!
//! Every threshold the resolver and the learning loop use lives here; the UI
//! tier boundaries depend on these values exactly.

/// Confidence for an exact hit on a user-confirmed alias.
pub const ALIAS_CONFIRMED_CONFIDENCE: u8 = 100;

/// Confidence for an exact hit on an alias not yet confirmed by the user.
pub const ALIAS_UNCONFIRMED_CONFIDENCE: u8 = 90;

/// Similarity below this is discarded as a candidate outright.
pub const SIMILARITY_FLOOR: f64 = 0.3;

/// Minimum similarity for the best candidate to be accepted as a match.
pub const SIMILARITY_ACCEPT: f64 = 0.4;

/// A personal-catalog candidate at or above this score suppresses the
/// global-catalog pass entirely.
pub const PERSONAL_SUFFICIENT: f64 = 0.5;

/// Global-catalog scores are scaled down; personal matches are trusted more.
pub const GLOBAL_SCALE: f64 = 0.7;

/// Bonus for a personal candidate that has an associated image.
pub const IMAGE_BONUS: f64 = 0.1;

/// Word-overlap similarity is scaled by this factor.
pub const WORD_OVERLAP_SCALE: f64 = 0.8;

/// Fuzzy confidence = round(similarity × this). Keeps fuzzy matches below
/// the confirmed tier so they always require explicit approval.
pub const FUZZY_CONFIDENCE_SCALE: f64 = 80.0;

/// How many fuzzy candidates are retained after scoring.
pub const CANDIDATE_KEEP: usize = 5;

/// Cap on the global-catalog sample read per resolution.
pub const GLOBAL_SAMPLE_LIMIT: u32 = 500;

/// UI tier boundary: at/above this *and* confirmed ⇒ "confirmed".
pub const CONFIRMED_TIER: u8 = 90;

/// UI tier boundary: a candidate at/above this ⇒ "suggested, needs approval".
pub const SUGGESTED_TIER: u8 = 50;

/// Items at/above this confidence with a canonical name are persisted as
/// aliases on save.
pub const ALIAS_SAVE_MIN: u8 = 50;

/// The three UI-visible states of a resolved item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Known mapping; no user action needed.
    Confirmed,
    /// A candidate exists but needs user approval.
    Suggested,
    /// Nothing usable; the user picks manually.
    NoMatch,
}

/// Classify a resolution for the UI. This is a binding contract: confidence
/// ≥90 and confirmed ⇒ confirmed; a candidate with confidence ≥50 ⇒
/// suggested; anything else ⇒ no match.
pub fn tier(confidence: u8, is_confirmed: bool, has_candidate: bool) -> MatchTier {
    if confidence >= CONFIRMED_TIER && is_confirmed {
        MatchTier::Confirmed
    } else if has_candidate && confidence >= SUGGESTED_TIER {
        MatchTier::Suggested
    } else {
        MatchTier::NoMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_requires_both_confidence_and_flag() {
        assert_eq!(tier(100, true, true), MatchTier::Confirmed);
        assert_eq!(tier(90, true, true), MatchTier::Confirmed);
        // High confidence without the confirmed flag is only a suggestion.
        assert_eq!(tier(90, false, true), MatchTier::Suggested);
        // Confirmed flag below the boundary does not promote.
        assert_eq!(tier(89, true, true), MatchTier::Suggested);
    }

    #[test]
    fn suggested_needs_a_candidate_and_fifty() {
        assert_eq!(tier(50, false, true), MatchTier::Suggested);
        assert_eq!(tier(49, false, true), MatchTier::NoMatch);
        assert_eq!(tier(70, false, false), MatchTier::NoMatch);
    }

    #[test]
    fn zero_is_no_match() {
        assert_eq!(tier(0, false, false), MatchTier::NoMatch);
    }

    #[test]
    fn fuzzy_scale_stays_below_confirmed_tier() {
        // A perfect fuzzy score still lands under the confirmed boundary.
        let max_fuzzy = (1.0 * FUZZY_CONFIDENCE_SCALE).round() as u8;
        assert!(max_fuzzy < CONFIRMED_TIER);
    }
}

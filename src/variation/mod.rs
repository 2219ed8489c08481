//! Variation identity resolution.
//!
//! An item's price series splits by "variation": the combination of refine
//! level, attached sub-items, and a free-text modifier. Two submissions that
//! describe the same configuration must land in the same series, so the key
//! derived here is order-independent over attachments and accent/case
//! insensitive over the modifier text. Keys are only ever produced by
//! [`derive_key`]; nothing else in the crate assembles them by hand.

mod label;

pub use label::derive_display_label;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Separator between key components. Modifier normalization guarantees the
/// text component can never contain this character.
const COMPONENT_SEP: char = ':';

/// Separator between attachment ids inside the attachment component.
const ATTACHMENT_SEP: char = '.';

// ---------------------------------------------------------------------------
// VariationKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariationKey(String);

impl VariationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrate a key previously produced by [`derive_key`] and persisted.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for VariationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive the canonical key for a configuration.
///
/// The refine component is always present, including `r0` — the bare,
/// unmodified item is itself a variation with a stable key. Attachments are
/// sorted ascending with multiplicity kept: the same card twice is a distinct
/// configuration from the card once. Free text contributes its normalized
/// form, or nothing when it normalizes to empty.
pub fn derive_key(refine: u32, attachment_ids: &[i64], free_text: Option<&str>) -> VariationKey {
    let mut key = format!("r{refine}");

    if !attachment_ids.is_empty() {
        let mut ids = attachment_ids.to_vec();
        ids.sort_unstable();
        key.push(COMPONENT_SEP);
        key.push('a');
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                key.push(ATTACHMENT_SEP);
            }
            key.push_str(&id.to_string());
        }
    }

    if let Some(text) = free_text {
        let normalized = normalize_modifier(text);
        if !normalized.is_empty() {
            key.push(COMPONENT_SEP);
            key.push('t');
            key.push_str(&normalized);
        }
    }

    VariationKey(key)
}

/// Canonical form of a free-text modifier: trimmed, accents stripped via NFD
/// decomposition, lowercased, whitespace runs collapsed to a single `-`, and
/// every other non-alphanumeric character dropped. Applying this twice gives
/// the same result as once.
pub fn normalize_modifier(raw: &str) -> String {
    let mut out = String::new();
    let mut pending_sep = false;

    for ch in raw.trim().nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            // collapse runs; never emit a leading dash
            pending_sep = !out.is_empty();
            continue;
        }
        if ch.is_alphanumeric() || ch == '-' {
            if pending_sep {
                out.push('-');
                pending_sep = false;
            }
            for low in ch.to_lowercase() {
                out.push(low);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_order_does_not_matter() {
        let a = derive_key(7, &[4001, 4133, 4044], Some("fire"));
        let b = derive_key(7, &[4044, 4001, 4133], Some("fire"));
        let c = derive_key(7, &[4133, 4044, 4001], Some("fire"));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn attachment_multiplicity_matters() {
        let single = derive_key(0, &[4001], None);
        let double = derive_key(0, &[4001, 4001], None);
        assert_ne!(single, double);
    }

    #[test]
    fn modifier_is_case_and_accent_insensitive() {
        let lower = derive_key(4, &[], Some("fogo"));
        let upper = derive_key(4, &[], Some("FOGO"));
        let title = derive_key(4, &[], Some("Fogo"));
        let accented = derive_key(4, &[], Some("Fogô"));
        assert_eq!(lower, upper);
        assert_eq!(upper, title);
        assert_eq!(title, accented);
    }

    #[test]
    fn modifier_with_cedilla_folds_to_plain_ascii() {
        assert_eq!(normalize_modifier("Maldição"), "maldicao");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_modifier("  Lâmina de Gelo!  ");
        let twice = normalize_modifier(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "lamina-de-gelo");
    }

    #[test]
    fn base_variation_key_is_stable_and_non_empty() {
        let key = derive_key(0, &[], Some(""));
        assert_eq!(key.as_str(), "r0");
        assert_eq!(derive_key(0, &[], None), key);
    }

    #[test]
    fn whitespace_only_modifier_contributes_nothing() {
        assert_eq!(derive_key(3, &[], Some("   ")), derive_key(3, &[], None));
    }

    #[test]
    fn separator_characters_cannot_leak_into_the_text_component() {
        // A modifier containing the component separator must not let the
        // text masquerade as another component.
        let tricky = derive_key(0, &[], Some("a:b"));
        assert_eq!(tricky.as_str(), "r0:tab");
        assert!(!normalize_modifier("x : y . z").contains(':'));
    }

    #[test]
    fn distinct_configurations_get_distinct_keys() {
        let base = derive_key(0, &[], None);
        assert_ne!(derive_key(1, &[], None), base);
        assert_ne!(derive_key(0, &[4001], None), base);
        assert_ne!(derive_key(0, &[], Some("fire")), base);
        assert_ne!(
            derive_key(7, &[4001], Some("fire")),
            derive_key(7, &[4002], Some("fire"))
        );
    }

    #[test]
    fn full_key_layout() {
        let key = derive_key(9, &[4044, 4001], Some("Véu Sombrio"));
        assert_eq!(key.as_str(), "r9:a4001.4044:tveu-sombrio");
    }
}

//! Human-readable labels for variations.
//!
//! Unlike the key, labels keep the modifier's original case and accents, and
//! hide refine 0 — the bare item reads as just its name even though `r0`
//! participates in the key.

/// Delimiter between label components.
const LABEL_SEP: &str = " · ";

/// Build the display label for a configuration. `resolve` maps attachment ids
/// to display names; unknown ids fall back to the raw id, never an error.
pub fn derive_display_label<F>(
    item_name: &str,
    refine: u32,
    attachment_ids: &[i64],
    free_text: Option<&str>,
    resolve: F,
) -> String
where
    F: Fn(i64) -> Option<String>,
{
    let mut parts: Vec<String> = Vec::new();

    if refine > 0 {
        parts.push(format!("{item_name} +{refine}"));
    } else {
        parts.push(item_name.to_string());
    }

    if let Some(text) = free_text {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }

    if !attachment_ids.is_empty() {
        let mut ids = attachment_ids.to_vec();
        ids.sort_unstable();
        let names: Vec<String> = ids
            .iter()
            .map(|&id| resolve(id).unwrap_or_else(|| id.to_string()))
            .collect();
        parts.push(format!("Attachments: {}", names.join(", ")));
    }

    parts.join(LABEL_SEP)
}

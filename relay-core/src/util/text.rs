//! Radio-etiquette text normalization: every spoken response should end
//! with a clear handoff cue so the other party knows to key up.

const OVER_VARIANTS: &[&str] = &["over and out.", "over and out", "over.", "over"];

/// Ensure `s` ends with "over." — idempotent: an existing "over"/"over."/
/// "over and out"/"over and out." suffix is normalized rather than
/// duplicated.
pub fn ensure_ends_with_over(s: &str) -> String {
    let trimmed = s.trim_end();
    let lowered = trimmed.to_ascii_lowercase();

    for variant in OVER_VARIANTS {
        if lowered.ends_with(variant) {
            let cut = trimmed.len() - variant.len();
            let base = trimmed[..cut].trim_end();
            return format!("{base} over.");
        }
    }

    format!("{trimmed} over.")
}

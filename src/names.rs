//! Player name normalization.
//!
//! In-game names arrive from the console in inconsistent shapes: stray quotes,
//! smart quotes pasted from phones, embedded spaces. Every map keyed by a player
//! name uses the canonical form produced here, so a player's chat line, respawn
//! line and admin-entered name all land on the same key.

/// Canonicalize a raw in-game player name.
///
/// Smart quotes become plain double quotes, leading/trailing quote and
/// whitespace characters are stripped, and the remainder is wrapped in double
/// quotes when it contains a space or any character outside `[A-Za-z0-9-]`.
///
/// The result is idempotent: `normalize_player_name(normalize_player_name(x))`
/// always equals `normalize_player_name(x)`.
pub fn normalize_player_name(raw: &str) -> String {
    let cleaned = raw.replace(['\u{201C}', '\u{201D}'], "\"");
    let trimmed = cleaned.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());

    if trimmed.is_empty() {
        return String::new();
    }

    let needs_quotes = trimmed
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '-'));

    if needs_quotes {
        format!("\"{}\"", trimmed)
    } else {
        trimmed.to_string()
    }
}

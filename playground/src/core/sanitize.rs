//! Terminal output cleanup.

use std::sync::LazyLock;

use regex::Regex;

/// ESC- or C1-introduced control sequences (colors, cursor movement).
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\x1B[@-_]|[\x{80}-\x{9F}])[0-?]*[ -/]*[@-~]").unwrap()
});

/// Remove ANSI escape sequences from an output chunk.
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

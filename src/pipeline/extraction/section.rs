//! Assessment/Plan section locator.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum characters of the section sent to the model.
pub const MAX_SECTION_CHARS: usize = 5000;

/// `Assessment`, optional whitespace/slash, `Plan`, optional colon; captures
/// lazily up to the next `word:` heading line or the end of the note.
static ASSESSMENT_PLAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)assessment\s*/?\s*plan\s*:?(.*?)(?:\n\w+:|\z)").expect("valid regex")
});

/// Find the Assessment/Plan section of a clinical note.
///
/// Returns `None` when there is no heading or the section body is blank.
pub fn find_assessment_plan(note_text: &str) -> Option<&str> {
    let captures = ASSESSMENT_PLAN_RE.captures(note_text)?;
    let body = captures.get(1)?.as_str().trim();
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

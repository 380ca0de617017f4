use serde::Serialize;

use super::codes::normalize_code;

/// A coded medical condition extracted from a note.
///
/// The code is normalized on construction and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    #[serde(rename = "condition")]
    name: String,
    code: String,
}

impl Condition {
    /// Returns `None` when the code normalizes to an empty string.
    pub fn new(name: &str, raw_code: &str) -> Option<Self> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return None;
        }
        Some(Self {
            name: name.trim().to_string(),
            code,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

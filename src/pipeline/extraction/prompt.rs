/// System prompt for condition extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a clinical coding assistant. Output valid JSON only.";

/// Build the condition extraction prompt for an Assessment/Plan section.
pub fn build_extraction_prompt(section: &str) -> String {
    format!(
        r#"Extract medical conditions and ICD-10 codes from this text.
Return ONLY a JSON array of objects with exactly two string keys, "condition" and "code". No other text.
Example:
[{{"condition": "Diabetes", "code": "E11"}}]

Text: {section}
"#
    )
}

use serde_json::Value;

use super::ExtractionError;
use crate::pipeline::types::Condition;

/// Conditions that survived validation, plus one warning per dropped element.
#[derive(Debug, Default)]
pub struct ParsedConditions {
    pub conditions: Vec<Condition>,
    pub warnings: Vec<String>,
}

/// Remove a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
///
/// Text outside the fence is discarded; unfenced text is returned trimmed.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    // Skip the fence marker and its language tag; a payload may share the tag's line.
    let content = trimmed[open + 3..].trim_start_matches(|c: char| c.is_ascii_alphabetic());

    match content.rfind("```") {
        Some(close) => content[..close].trim(),
        None => content.trim(),
    }
}

/// Parse the model's JSON array into conditions.
///
/// A payload that is not JSON is [`ExtractionError::JsonParsing`]; valid JSON
/// that is not an array is [`ExtractionError::UnexpectedSchema`]. Elements
/// missing a string `condition` or `code` are dropped with a warning; elements
/// whose code normalizes to nothing are dropped silently.
pub fn parse_conditions_response(response: &str) -> Result<ParsedConditions, ExtractionError> {
    let payload = strip_code_fences(response);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ExtractionError::JsonParsing(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(ExtractionError::UnexpectedSchema(format!(
            "expected a JSON array, got {}",
            json_kind(&value)
        )));
    };

    let mut parsed = ParsedConditions::default();
    for (idx, item) in items.iter().enumerate() {
        let name = item.get("condition").and_then(Value::as_str);
        let code = item.get("code").and_then(Value::as_str);

        let (Some(name), Some(code)) = (name, code) else {
            let warning = format!(
                "Dropped extracted element {idx}: requires string 'condition' and 'code' fields"
            );
            tracing::warn!(element = idx, "Malformed condition element dropped");
            parsed.warnings.push(warning);
            continue;
        };

        match Condition::new(name, code) {
            Some(condition) => parsed.conditions.push(condition),
            None => {
                tracing::debug!(element = idx, condition = name, "Condition without code dropped");
            }
        }
    }

    Ok(parsed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

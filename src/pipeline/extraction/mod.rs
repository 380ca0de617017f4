//! Condition extraction client.
//!
//! section → prompt → LLM (with rate-limit backoff) → fence strip → parse → normalize
//!
//! Failures that should not stop a note (rate-limit exhaustion, unparsable
//! payloads) come back inside [`ExtractionReport::errors`]. Anything else is
//! returned as an [`ExtractionError`] for the caller to record.

pub mod parser;
pub mod prompt;
pub mod retry;
pub mod section;

pub use parser::{parse_conditions_response, strip_code_fences, ParsedConditions};
pub use prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use section::{find_assessment_plan, truncate_chars, MAX_SECTION_CHARS};

use thiserror::Error;

use crate::pipeline::llm::{FailureClass, LlmClient, LlmError};
use crate::pipeline::types::Condition;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Unexpected response schema: {0}")]
    UnexpectedSchema(String),
}

/// Outcome of extracting one note.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub conditions: Vec<Condition>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Sends a note's Assessment/Plan section to the model and parses coded conditions.
pub struct ConditionExtractor {
    llm: Box<dyn LlmClient + Send + Sync>,
    model_name: String,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl ConditionExtractor {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model_name: &str) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
            policy: RetryPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn llm(&self) -> &(dyn LlmClient + Send + Sync) {
        self.llm.as_ref()
    }

    /// Extract coded conditions from a clinical note.
    ///
    /// A note without an Assessment/Plan section yields an empty report and
    /// no error.
    pub fn extract(&self, note_text: &str) -> Result<ExtractionReport, ExtractionError> {
        let mut report = ExtractionReport::default();

        let Some(section) = find_assessment_plan(note_text) else {
            tracing::warn!("No Assessment/Plan section found");
            return Ok(report);
        };
        let section = truncate_chars(section, MAX_SECTION_CHARS);
        let prompt = build_extraction_prompt(section);

        let response = match self.call_llm_with_retry(&prompt) {
            Ok(response) => response,
            Err(e) => match e.failure_class() {
                FailureClass::RateLimited => {
                    tracing::error!(
                        attempts = self.policy.max_attempts(),
                        error = %e,
                        "Rate limit retries exhausted"
                    );
                    report.errors.push(format!(
                        "Model rate limit retries exhausted after {} attempts: {e}",
                        self.policy.max_attempts()
                    ));
                    return Ok(report);
                }
                FailureClass::Malformed => {
                    tracing::error!(error = %e, "Model returned an unusable response");
                    report.errors.push(format!("Failed to parse model response: {e}"));
                    return Ok(report);
                }
                FailureClass::Other => return Err(e.into()),
            },
        };

        match parse_conditions_response(&response) {
            Ok(parsed) => {
                tracing::info!(
                    conditions = parsed.conditions.len(),
                    dropped = parsed.warnings.len(),
                    "Extracted conditions"
                );
                report.conditions = parsed.conditions;
                report.warnings = parsed.warnings;
                Ok(report)
            }
            Err(ExtractionError::JsonParsing(msg)) => {
                tracing::error!(error = %msg, "Failed to parse LLM response");
                report
                    .errors
                    .push(format!("Failed to parse model response: {msg}"));
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    /// Call the model, backing off on rate-limit errors only.
    ///
    /// Returns the rate-limit error itself once `max_attempts` calls have failed.
    fn call_llm_with_retry(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self
                .llm
                .generate(&self.model_name, prompt, EXTRACTION_SYSTEM_PROMPT)
            {
                Ok(response) => return Ok(response),
                Err(e)
                    if e.failure_class() == FailureClass::RateLimited
                        && attempt + 1 < self.policy.max_attempts() =>
                {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "Model rate limited, backing off"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::retry::testing::RecordingSleeper;
    use super::*;
    use crate::pipeline::llm::testing::{ScriptedLlmClient, Step};
    use crate::pipeline::llm::MockLlmClient;

    const NOTE: &str = "Assessment/Plan:\n1. Diabetes (E11.9)\n2. Hypertension (I10)";
    const REPLY: &str = r#"[{"condition":"Diabetes","code":"E11.9"},{"condition":"Hypertension","code":"I10"}]"#;

    fn extractor(llm: ScriptedLlmClient, sleeper: &RecordingSleeper) -> ConditionExtractor {
        ConditionExtractor::new(Box::new(llm), "medgemma:4b").with_sleeper(Box::new(sleeper.clone()))
    }

    #[test]
    fn extracts_and_normalizes() {
        let llm = MockLlmClient::new(&format!("```json\n{REPLY}\n```"));
        let extractor = ConditionExtractor::new(Box::new(llm), "medgemma:4b");

        let report = extractor.extract(NOTE).unwrap();
        let codes: Vec<&str> = report.conditions.iter().map(|c| c.code()).collect();
        assert_eq!(codes, ["E119", "I10"]);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn no_section_skips_model_call() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::reply(REPLY);
        let calls = llm.calls();

        let report = extractor(llm, &sleeper).extract("No relevant sections here").unwrap();

        assert!(report.conditions.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn only_section_text_is_sent_and_capped() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::reply("[]");
        let prompts = llm.prompts();
        let long_plan = "y".repeat(MAX_SECTION_CHARS + 500);
        let note = format!("Subjective: secret history\nAssessment/Plan: {long_plan}");

        extractor(llm, &sleeper).extract(&note).unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("secret history"));
        assert!(prompts[0].contains(&"y".repeat(MAX_SECTION_CHARS)));
        assert!(!prompts[0].contains(&"y".repeat(MAX_SECTION_CHARS + 1)));
    }

    #[test]
    fn retries_rate_limit_then_succeeds() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::new(
            vec![Step::RateLimited, Step::RateLimited],
            Step::Reply(REPLY.into()),
        );
        let calls = llm.calls();

        let report = extractor(llm, &sleeper).extract(NOTE).unwrap();

        assert_eq!(report.conditions.len(), 2);
        assert!(report.errors.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            [Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(sleeper.total() >= Duration::from_secs(3));
    }

    #[test]
    fn rate_limit_exhaustion_is_recorded_not_raised() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::always(Step::RateLimited);
        let calls = llm.calls();

        let report = extractor(llm, &sleeper).extract(NOTE).unwrap();

        assert!(report.conditions.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("exhausted after 3 attempts"));
    }

    #[test]
    fn custom_attempt_cap_is_honoured() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::always(Step::RateLimited);
        let calls = llm.calls();

        let report = extractor(llm, &sleeper)
            .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(10)))
            .extract(NOTE)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.delays().len(), 4);
        assert_eq!(sleeper.delays()[3], Duration::from_millis(80));
        assert!(report.errors[0].contains("5 attempts"));
    }

    #[test]
    fn zero_attempt_cap_still_makes_one_call() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::always(Step::RateLimited);
        let calls = llm.calls();

        let report = extractor(llm, &sleeper)
            .with_retry_policy(RetryPolicy::new(0, Duration::from_secs(1)))
            .extract(NOTE)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
        assert!(report.errors[0].contains("exhausted after 1 attempts"));
    }

    #[test]
    fn unparsable_payload_is_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::reply("I found diabetes and hypertension.");
        let calls = llm.calls();

        let report = extractor(llm, &sleeper).extract(NOTE).unwrap();

        assert!(report.conditions.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn malformed_provider_body_is_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::always(Step::Malformed);
        let calls = llm.calls();

        let report = extractor(llm, &sleeper).extract(NOTE).unwrap();

        assert!(report.conditions.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connection_failure_propagates() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::always(Step::Unreachable);
        let calls = llm.calls();

        let err = extractor(llm, &sleeper).extract(NOTE).unwrap_err();

        assert!(matches!(err, ExtractionError::Llm(LlmError::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_array_payload_propagates() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::reply(r#"{"conditions": []}"#);

        let err = extractor(llm, &sleeper).extract(NOTE).unwrap_err();
        assert!(matches!(err, ExtractionError::UnexpectedSchema(_)));
    }

    #[test]
    fn malformed_element_is_dropped_with_warning() {
        let sleeper = RecordingSleeper::default();
        let llm = ScriptedLlmClient::reply(
            r#"[{"condition":"Diabetes","code":"E11.9"},{"condition":"Hypertension"}]"#,
        );

        let report = extractor(llm, &sleeper).extract(NOTE).unwrap();

        assert_eq!(report.conditions.len(), 1);
        assert_eq!(report.conditions[0].code(), "E119");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.errors.is_empty());
    }
}

//! HccWorkflow: drives one note through the stage sequence.
//!
//! validate_input → extract → validate_extraction → evaluate → done
//!
//! Only a failed input validation skips ahead to `Done`; extraction and
//! evaluation failures are recorded in the state and the run continues.

use std::sync::Arc;

use super::state::{PipelineResult, PipelineState, Stage, StageUpdate};
use crate::pipeline::codes::ReferenceCodes;
use crate::pipeline::evaluation::HccEvaluator;
use crate::pipeline::extraction::ConditionExtractor;

pub const MISSING_NOTE_TEXT: &str = "Validation failed: missing note_text";
pub const NO_CONDITIONS_EXTRACTED: &str = "No conditions extracted";
pub const NO_RELEVANT_CONDITIONS: &str = "No HCC-relevant conditions found";

/// Input for one note run.
#[derive(Debug, Clone, Default)]
pub struct NoteInput {
    pub note_text: Option<String>,
    /// Pre-loaded codes; when absent the evaluator loads its default set.
    pub reference_codes: Option<Arc<ReferenceCodes>>,
}

impl NoteInput {
    pub fn new(note_text: impl Into<String>) -> Self {
        Self {
            note_text: Some(note_text.into()),
            reference_codes: None,
        }
    }

    pub fn with_reference_codes(mut self, codes: Arc<ReferenceCodes>) -> Self {
        self.reference_codes = Some(codes);
        self
    }
}

/// Sequences extraction and evaluation over a typed per-note state.
pub struct HccWorkflow {
    extractor: ConditionExtractor,
    evaluator: HccEvaluator,
}

impl HccWorkflow {
    pub fn new(extractor: ConditionExtractor, evaluator: HccEvaluator) -> Self {
        Self {
            extractor,
            evaluator,
        }
    }

    pub fn extractor(&self) -> &ConditionExtractor {
        &self.extractor
    }

    /// Run every stage for one note. Always reaches `Done`.
    pub fn run(&self, input: NoteInput) -> PipelineResult {
        let mut state = PipelineState::new(input.note_text, input.reference_codes);
        let mut stage = Stage::ValidateInput;

        while stage != Stage::Done {
            tracing::debug!(stage = %stage, "Entering stage");
            let update = self.run_stage(stage, &state);
            let halt = update.halt;
            state.apply(update);
            stage = if halt { Stage::Done } else { stage.next() };
        }

        tracing::debug!(
            conditions = state.conditions().len(),
            relevant = state.relevant_conditions().len(),
            warnings = state.warnings().len(),
            errors = state.errors().len(),
            "Pipeline done"
        );
        state.into_result()
    }

    fn run_stage(&self, stage: Stage, state: &PipelineState) -> StageUpdate {
        match stage {
            Stage::ValidateInput => validate_input(state),
            Stage::Extract => self.extract(state),
            Stage::ValidateExtraction => validate_extraction(state),
            Stage::Evaluate => self.evaluate(state),
            Stage::Done => StageUpdate::default(),
        }
    }

    fn extract(&self, state: &PipelineState) -> StageUpdate {
        let note_text = state.note_text().unwrap_or_default();
        match self.extractor.extract(note_text) {
            Ok(report) => StageUpdate {
                conditions: Some(report.conditions),
                warnings: report.warnings,
                errors: report.errors,
                ..StageUpdate::default()
            },
            Err(e) => {
                tracing::error!(error = %e, "Extraction failed");
                StageUpdate {
                    conditions: Some(Vec::new()),
                    errors: vec![format!("Extraction failed: {e}")],
                    ..StageUpdate::default()
                }
            }
        }
    }

    fn evaluate(&self, state: &PipelineState) -> StageUpdate {
        match self
            .evaluator
            .evaluate(state.conditions(), state.reference_codes())
        {
            Ok(relevant) => {
                let mut update = StageUpdate::default();
                if relevant.is_empty() && !state.conditions().is_empty() {
                    update.warnings.push(NO_RELEVANT_CONDITIONS.into());
                }
                update.relevant_conditions = Some(relevant);
                update
            }
            Err(e) => {
                tracing::error!(error = %e, "Evaluation failed");
                StageUpdate {
                    relevant_conditions: Some(Vec::new()),
                    errors: vec![format!("Evaluation failed: {e}")],
                    ..StageUpdate::default()
                }
            }
        }
    }
}

fn validate_input(state: &PipelineState) -> StageUpdate {
    let has_text = state
        .note_text()
        .is_some_and(|text| !text.trim().is_empty());

    if !has_text {
        tracing::error!("Note has no text, skipping remaining stages");
        return StageUpdate {
            conditions: Some(Vec::new()),
            relevant_conditions: Some(Vec::new()),
            errors: vec![MISSING_NOTE_TEXT.into()],
            halt: true,
            ..StageUpdate::default()
        };
    }

    StageUpdate {
        conditions: Some(Vec::new()),
        relevant_conditions: Some(Vec::new()),
        ..StageUpdate::default()
    }
}

fn validate_extraction(state: &PipelineState) -> StageUpdate {
    if state.conditions().is_empty() {
        tracing::warn!("No conditions extracted");
        StageUpdate::warning(NO_CONDITIONS_EXTRACTED)
    } else {
        StageUpdate::default()
    }
}

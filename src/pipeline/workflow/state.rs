//! Per-note pipeline state and the partial updates stages produce.

use std::sync::Arc;

use serde::Serialize;

use crate::pipeline::codes::ReferenceCodes;
use crate::pipeline::types::Condition;

// ═══════════════════════════════════════════
// Stages
// ═══════════════════════════════════════════

/// The linear stages of a note run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidateInput,
    Extract,
    ValidateExtraction,
    Evaluate,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateInput => "validate_input",
            Self::Extract => "extract",
            Self::ValidateExtraction => "validate_extraction",
            Self::Evaluate => "evaluate",
            Self::Done => "done",
        }
    }

    /// Successor stage; `Done` is terminal.
    pub fn next(&self) -> Stage {
        match self {
            Self::ValidateInput => Self::Extract,
            Self::Extract => Self::ValidateExtraction,
            Self::ValidateExtraction => Self::Evaluate,
            Self::Evaluate | Self::Done => Self::Done,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// State
// ═══════════════════════════════════════════

/// Mutable record threaded through the stages of one note.
///
/// Warnings and errors only ever grow.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    note_text: Option<String>,
    reference_codes: Option<Arc<ReferenceCodes>>,
    conditions: Vec<Condition>,
    relevant_conditions: Vec<Condition>,
    warnings: Vec<String>,
    errors: Vec<String>,
    input_rejected: bool,
}

impl PipelineState {
    pub fn new(note_text: Option<String>, reference_codes: Option<Arc<ReferenceCodes>>) -> Self {
        Self {
            note_text,
            reference_codes,
            ..Self::default()
        }
    }

    pub fn note_text(&self) -> Option<&str> {
        self.note_text.as_deref()
    }

    pub fn reference_codes(&self) -> Option<&Arc<ReferenceCodes>> {
        self.reference_codes.as_ref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn relevant_conditions(&self) -> &[Condition] {
        &self.relevant_conditions
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Merge a stage's partial update.
    ///
    /// Fields the update leaves as `None` are unchanged; warnings and errors
    /// are appended. Relevant conditions whose code is absent from
    /// `conditions` are discarded so the subset invariant always holds.
    pub fn apply(&mut self, update: StageUpdate) {
        if let Some(conditions) = update.conditions {
            self.conditions = conditions;
        }
        if let Some(relevant) = update.relevant_conditions {
            self.relevant_conditions = relevant;
        }
        self.relevant_conditions
            .retain(|r| self.conditions.iter().any(|c| c.code() == r.code()));
        self.warnings.extend(update.warnings);
        self.errors.extend(update.errors);
        self.input_rejected |= update.halt;
    }

    pub fn into_result(self) -> PipelineResult {
        PipelineResult {
            conditions: self.conditions,
            relevant_conditions: self.relevant_conditions,
            warnings: self.warnings,
            errors: self.errors,
            input_rejected: self.input_rejected,
        }
    }
}

/// Partial state produced by one stage.
#[derive(Debug, Default)]
pub struct StageUpdate {
    pub conditions: Option<Vec<Condition>>,
    pub relevant_conditions: Option<Vec<Condition>>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Skip the remaining stages and go straight to `Done`.
    pub halt: bool,
}

impl StageUpdate {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            warnings: vec![message.into()],
            ..Self::default()
        }
    }
}

// ═══════════════════════════════════════════
// Result
// ═══════════════════════════════════════════

/// Final, read-only outcome of one note run.
///
/// An empty `errors` list does not by itself mean the note had codeable
/// content: zero conditions with no error is a legitimate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub conditions: Vec<Condition>,
    pub relevant_conditions: Vec<Condition>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// The note failed input validation and no other stage ran.
    #[serde(skip)]
    pub input_rejected: bool,
}

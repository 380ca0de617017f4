//! Batch driver: note directory → one pipeline run per note → `hcc_results.json`.
//!
//! The reference code set is loaded once up front; failing to load it aborts
//! the batch. After that every note is isolated: a note that cannot be read
//! is recorded against that note and the batch moves on. Notes run
//! sequentially, one model call at a time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{PipelineSettings, RESULTS_FILE_NAME};
use crate::pipeline::codes::{CodeSetError, CodeSetSource, CsvCodeSource, ReferenceCodes};
use crate::pipeline::evaluation::HccEvaluator;
use crate::pipeline::extraction::ConditionExtractor;
use crate::pipeline::llm::{LlmClient, LlmError, OllamaClient};
use crate::pipeline::types::Condition;
use crate::pipeline::workflow::{HccWorkflow, NoteInput, PipelineResult};

pub const NO_NOTES_FOUND: &str = "No notes found in input directory";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Reference codes unavailable: {0}")]
    CodeSet(#[from] CodeSetError),

    #[error("Input directory {} not found", .0.display())]
    InputDirNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),
}

// ═══════════════════════════════════════════
// Report types
// ═══════════════════════════════════════════

/// Per-note entry of the results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteOutcome {
    pub extracted_conditions: Vec<Condition>,
    pub hcc_relevant: Vec<Condition>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl NoteOutcome {
    /// Outcome for a note whose run could not start.
    pub fn failed(error: String) -> Self {
        Self {
            extracted_conditions: Vec::new(),
            hcc_relevant: Vec::new(),
            warnings: Vec::new(),
            errors: vec![error],
        }
    }
}

impl From<PipelineResult> for NoteOutcome {
    fn from(result: PipelineResult) -> Self {
        Self {
            extracted_conditions: result.conditions,
            hcc_relevant: result.relevant_conditions,
            warnings: result.warnings,
            errors: result.errors,
        }
    }
}

/// Aggregated outcome of a batch run, keyed by note file name.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub results: BTreeMap<String, NoteOutcome>,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            results: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Number of notes with at least one recorded error.
    pub fn notes_with_errors(&self) -> usize {
        self.results.values().filter(|o| !o.errors.is_empty()).count()
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════
// Input / output
// ═══════════════════════════════════════════

/// A note file discovered in the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub name: String,
    pub path: PathBuf,
}

/// List regular, non-hidden files of `dir`, sorted by name.
pub fn list_input_notes(dir: &Path) -> Result<Vec<NoteFile>, BatchError> {
    if !dir.is_dir() {
        return Err(BatchError::InputDirNotFound(dir.to_path_buf()));
    }

    let mut notes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        // Follows symlinks.
        if name.starts_with('.') || !path.is_file() {
            continue;
        }
        notes.push(NoteFile { name, path });
    }
    notes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(notes)
}

/// Write the report as pretty JSON to `<output_dir>/hcc_results.json`.
pub fn save_output(report: &BatchReport, output_dir: &Path) -> Result<PathBuf, BatchError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(RESULTS_FILE_NAME);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    tracing::info!(path = %path.display(), notes = report.results.len(), "Saved batch results");
    Ok(path)
}

// ═══════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════

/// Runs the pipeline over a set of notes with a shared reference set.
pub struct BatchRunner {
    workflow: HccWorkflow,
}

impl BatchRunner {
    pub fn new(workflow: HccWorkflow) -> Self {
        Self { workflow }
    }

    /// Build a runner from settings around the given model client.
    pub fn from_settings(
        settings: &PipelineSettings,
        llm: Box<dyn LlmClient + Send + Sync>,
    ) -> Self {
        Self::new(build_workflow(settings, llm))
    }

    /// Run every note in order. Never fails as a whole.
    pub fn run_notes(&self, notes: &[NoteFile], codes: &Arc<ReferenceCodes>) -> BatchReport {
        let mut report = BatchReport::new();
        let _span = tracing::info_span!("batch", run_id = %report.run_id, notes = notes.len()).entered();

        for note in notes {
            let _note_span = tracing::info_span!("note", note = %note.name).entered();
            let start = Instant::now();

            let outcome = match fs::read_to_string(&note.path) {
                Ok(text) => {
                    let input = NoteInput::new(text).with_reference_codes(Arc::clone(codes));
                    NoteOutcome::from(self.workflow.run(input))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read note");
                    NoteOutcome::failed(format!("Failed to read note {}: {e}", note.name))
                }
            };

            tracing::info!(
                conditions = outcome.extracted_conditions.len(),
                relevant = outcome.hcc_relevant.len(),
                errors = outcome.errors.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Processed note"
            );
            report.results.insert(note.name.clone(), outcome);
        }

        report
    }
}

/// Assemble extractor and evaluator from settings.
pub fn build_workflow(
    settings: &PipelineSettings,
    llm: Box<dyn LlmClient + Send + Sync>,
) -> HccWorkflow {
    let extractor =
        ConditionExtractor::new(llm, &settings.model_name).with_retry_policy(settings.retry_policy());
    let evaluator = HccEvaluator::new(Box::new(code_source(settings)));
    HccWorkflow::new(extractor, evaluator)
}

pub fn code_source(settings: &PipelineSettings) -> CsvCodeSource {
    CsvCodeSource::new(&settings.codes_path, &settings.code_column)
}

/// Ollama client configured from settings.
pub fn ollama_client(settings: &PipelineSettings) -> Result<OllamaClient, BatchError> {
    Ok(OllamaClient::new(
        &settings.ollama_url,
        settings.llm_timeout_secs,
    )?)
}

/// Full batch against the configured Ollama instance.
pub fn process_directory(settings: &PipelineSettings) -> Result<BatchReport, BatchError> {
    let llm = ollama_client(settings)?;
    process_directory_with_client(settings, Box::new(llm))
}

/// Full batch: load codes (fatal on failure), list notes, run, save.
pub fn process_directory_with_client(
    settings: &PipelineSettings,
    llm: Box<dyn LlmClient + Send + Sync>,
) -> Result<BatchReport, BatchError> {
    let source = code_source(settings);
    let codes = Arc::new(source.load()?);
    let notes = list_input_notes(&settings.input_dir)?;

    let report = if notes.is_empty() {
        tracing::warn!(input_dir = %settings.input_dir.display(), "No notes found in input directory");
        let mut report = BatchReport::new();
        report.errors.push(NO_NOTES_FOUND.into());
        report
    } else {
        BatchRunner::from_settings(settings, llm).run_notes(&notes, &codes)
    };

    save_output(&report, &settings.output_dir)?;
    Ok(report)
}

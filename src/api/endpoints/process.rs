//! Single-note processing endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ProcessRequest};
use crate::pipeline::workflow::{NoteInput, PipelineResult, MISSING_NOTE_TEXT};

/// `POST /api/process`: run one note through the pipeline.
///
/// Extraction and evaluation problems are reported inside the 200 body's
/// `errors`; only a missing or blank `note_text` is rejected with 400.
pub async fn process(
    State(ctx): State<ApiContext>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
    let input = NoteInput {
        note_text: req.note_text,
        reference_codes: Some(Arc::clone(&ctx.codes)),
    };
    let workflow = Arc::clone(&ctx.workflow);

    // Model calls block, and rate-limit backoff sleeps the thread.
    let result = tokio::task::spawn_blocking(move || workflow.run(input)).await?;

    if result.input_rejected {
        return Err(ApiError::BadRequest(MISSING_NOTE_TEXT.into()));
    }

    tracing::info!(
        conditions = result.conditions.len(),
        relevant = result.relevant_conditions.len(),
        errors = result.errors.len(),
        "Processed note"
    );
    Ok(Json(result))
}

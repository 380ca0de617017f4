//! Health check endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, HealthResponse};

/// `GET /api/health`: model reachability and loaded code count.
///
/// An unreachable model reports `degraded` rather than failing the request.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let workflow = ctx.workflow.clone();
    let model = workflow.extractor().model_name().to_string();

    let probe = model.clone();
    let available = tokio::task::spawn_blocking(move || {
        workflow.extractor().llm().is_model_available(&probe)
    })
    .await?;

    let model_available = match available {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "Model availability check failed");
            false
        }
    };

    Ok(Json(HealthResponse {
        status: if model_available { "ok" } else { "degraded" },
        version: crate::config::APP_VERSION,
        model,
        model_available,
        reference_codes: ctx.codes.len(),
    }))
}

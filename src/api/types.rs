//! Shared state and wire types for the HTTP API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::codes::ReferenceCodes;
use crate::pipeline::workflow::HccWorkflow;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub workflow: Arc<HccWorkflow>,
    /// Loaded once at startup and handed to every run.
    pub codes: Arc<ReferenceCodes>,
}

impl ApiContext {
    pub fn new(workflow: HccWorkflow, codes: ReferenceCodes) -> Self {
        Self {
            workflow: Arc::new(workflow),
            codes: Arc::new(codes),
        }
    }
}

/// `POST /api/process` body.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub note_text: Option<String>,
}

/// `GET /api/health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub model_available: bool,
    pub reference_codes: usize,
}

use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::extraction::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "hcc-pipeline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory of clinical notes, one note per file.
pub const DEFAULT_INPUT_DIR: &str = "data/progress_notes";
/// Directory receiving `hcc_results.json`.
pub const DEFAULT_OUTPUT_DIR: &str = "data/output";
pub const DEFAULT_CODES_PATH: &str = "data/HCC_relevant_codes.csv";
pub const DEFAULT_CODE_COLUMN: &str = "ICD-10-CM Codes";
pub const RESULTS_FILE_NAME: &str = "hcc_results.json";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "medgemma:4b";
/// Per-request timeout for model calls (seconds).
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Rate-limit retry schedule: 3 calls, sleeping 1s then 2s.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "hcc_pipeline_lib=info,hcc_pipeline=info,tower_http=info"
}

/// Everything a batch run or API server needs to build its pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub codes_path: PathBuf,
    pub code_column: String,
    pub ollama_url: String,
    pub model_name: String,
    pub llm_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            codes_path: PathBuf::from(DEFAULT_CODES_PATH),
            code_column: DEFAULT_CODE_COLUMN.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
        }
    }
}

impl PipelineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.backoff_base_secs),
        )
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE_NAME)
    }
}

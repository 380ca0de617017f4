pub mod codes; // Code normalizer + HCC reference set loader
pub mod types;
pub mod llm; // Model provider boundary (Ollama)
pub mod extraction; // Assessment/Plan → LLM → coded conditions
pub mod evaluation; // HCC relevance filter
pub mod workflow; // Per-note stage machine

pub use codes::{normalize_code, CodeSetError, CodeSetSource, CsvCodeSource, ReferenceCodes};
pub use evaluation::{evaluate, HccEvaluator};
pub use extraction::{ConditionExtractor, ExtractionError, ExtractionReport, RetryPolicy};
pub use llm::{LlmClient, LlmError, OllamaClient};
pub use types::Condition;
pub use workflow::{HccWorkflow, NoteInput, PipelineResult};

pub mod runner;
pub mod state;

pub use runner::{
    HccWorkflow, NoteInput, MISSING_NOTE_TEXT, NO_CONDITIONS_EXTRACTED, NO_RELEVANT_CONDITIONS,
};
pub use state::{PipelineResult, PipelineState, Stage, StageUpdate};

//! Pipeline module: runs extraction, download, upload and rewrite in order
//!
//! [`Pipeline`] owns the stage drivers and produces one [`ProcessingOutcome`]
//! per document. [`RunStage`] tracks where a run is.

mod orchestrator;
mod outcome;
mod stage;

pub use orchestrator::Pipeline;
pub use outcome::{OutcomeCounts, ProcessingOutcome, ResourceFailure, ResourceReport, ResourceStatus};
pub use stage::RunStage;

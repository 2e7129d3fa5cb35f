//! Invoice upload: file model, progress tracking, and the single-task
//! orchestrator.

mod model;
mod orchestrator;
mod progress;

pub use model::{InvoiceFormat, UploadEvent, UploadFailure, UploadFile, UploadOutcome, UploadState, UploadTask};
pub use orchestrator::{UPLOAD_FIELD, UPLOAD_PATH, UploadHandle, UploadOrchestrator, failure_from_gateway};
pub use progress::ProgressTracker;

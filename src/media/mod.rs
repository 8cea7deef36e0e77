//! Downloaded media: classification, batching and upload
pub mod batch;
pub mod classify;
pub mod upload;

pub use batch::{batches, MediaBatch, PlannedSend, UploadPlan};
pub use classify::{classify_directory, ClassifiedFile, ClassifiedMedia, MediaKind, OversizedFile};
pub use upload::{BatchUploader, MediaSink, SendError, UploadOutcome, UploadReport};

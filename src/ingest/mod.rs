//! Document ingestion: format validation and bounded-parallelism upload.

pub mod coordinator;
pub mod types;
pub mod validate;

pub use coordinator::UploadCoordinator;
pub use types::{InvalidFormatError, UploadOutcome, UploadReport, UploadStatus, ValidDocument};
pub use validate::validate;

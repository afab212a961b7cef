//! Outcome and report types for document ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Document rejected before any upload call was spent on it.
#[derive(Debug, Clone, Error)]
#[error("Invalid format: {reason}")]
pub struct InvalidFormatError {
    /// Display name of the rejected document.
    pub document: String,
    /// Underlying read or parse failure.
    pub reason: String,
}

/// Document that parsed as a structurally valid PDF.
#[derive(Debug, Clone)]
pub struct ValidDocument {
    /// Location the document was read from.
    pub path: PathBuf,
    /// File name shown in reports.
    pub name: String,
    /// Raw bytes, uploaded as-is.
    pub bytes: Vec<u8>,
    /// Number of pages found in the page tree.
    pub page_count: usize,
}

/// Final status of a single document in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// Uploaded and attached to the store.
    Success,
    /// Rejected by validation or by the remote service.
    Failed,
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Display name of the document.
    pub document: String,
    /// Whether the document reached the store.
    pub status: UploadStatus,
    /// Failure detail, present only for failed outcomes.
    pub error: Option<String>,
}

impl UploadOutcome {
    pub(crate) fn success(document: String) -> Self {
        Self {
            document,
            status: UploadStatus::Success,
            error: None,
        }
    }

    pub(crate) fn failed(document: String, error: impl Into<String>) -> Self {
        Self {
            document,
            status: UploadStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Aggregate over every outcome of one batch.
///
/// `succeeded + failed == total` always holds. A report with `total == 0` means the source
/// directory held no accepted documents; it is not a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Number of documents dispatched.
    pub total: usize,
    /// Number of documents attached to the store.
    pub succeeded: usize,
    /// Number of documents that failed.
    pub failed: usize,
    /// Failed outcomes in completion order.
    pub failures: Vec<UploadOutcome>,
    /// Names of successfully uploaded documents in completion order.
    pub uploaded: Vec<String>,
}

impl UploadReport {
    /// Whether the batch had no input documents at all.
    pub fn is_empty_batch(&self) -> bool {
        self.total == 0
    }

    pub(crate) fn record(&mut self, outcome: UploadOutcome) {
        self.total += 1;
        match outcome.status {
            UploadStatus::Success => {
                self.succeeded += 1;
                self.uploaded.push(outcome.document);
            }
            UploadStatus::Failed => {
                self.failed += 1;
                self.failures.push(outcome);
            }
        }
    }
}

use crate::ingest::UploadReport;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Thread-safe counters describing uploads and answered questions.
///
/// The document directory is uploaded again on every refresh, so indexed documents are
/// counted by name rather than per upload.
#[derive(Default)]
pub struct AssistantMetrics {
    indexed_documents: Mutex<HashSet<String>>,
    failed_uploads: AtomicU64,
    questions_answered: AtomicU64,
    questions_failed: AtomicU64,
}

impl AssistantMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one upload batch.
    pub fn record_batch(&self, report: &UploadReport) {
        self.indexed_documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(report.uploaded.iter().cloned());
        self.failed_uploads
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    /// Record a question that produced an answer.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that ended in a user-facing error.
    pub fn record_failed_question(&self) {
        self.questions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents_uploaded = self
            .indexed_documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64;
        MetricsSnapshot {
            documents_uploaded,
            documents_failed: self.failed_uploads.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            questions_failed: self.questions_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Distinct documents attached to the store since startup.
    pub documents_uploaded: u64,
    /// Upload attempts rejected by validation or by the service since startup.
    pub documents_failed: u64,
    /// Questions that produced an answer.
    pub questions_answered: u64,
    /// Questions that ended in an error.
    pub questions_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(uploaded: &[&str], failed: usize) -> UploadReport {
        UploadReport {
            total: uploaded.len() + failed,
            succeeded: uploaded.len(),
            failed,
            uploaded: uploaded.iter().map(|name| name.to_string()).collect(),
            ..UploadReport::default()
        }
    }

    #[test]
    fn accumulates_batches_and_questions() {
        let metrics = AssistantMetrics::new();
        metrics.record_batch(&report(&["a.pdf", "b.pdf"], 1));
        metrics.record_batch(&report(&["c.pdf"], 0));
        metrics.record_answer();
        metrics.record_failed_question();
        metrics.record_answer();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_uploaded, 3);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.questions_answered, 2);
        assert_eq!(snapshot.questions_failed, 1);
    }

    #[test]
    fn repeated_batches_count_each_document_once() {
        let metrics = AssistantMetrics::new();
        metrics.record_batch(&report(&["a.pdf", "b.pdf"], 0));
        metrics.record_batch(&report(&["a.pdf", "b.pdf", "new.pdf"], 0));

        assert_eq!(metrics.snapshot().documents_uploaded, 3);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        assert_eq!(AssistantMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}

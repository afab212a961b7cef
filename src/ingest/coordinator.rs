//! Bounded-parallelism batch upload into a remote store.

use crate::ingest::types::{UploadOutcome, UploadReport};
use crate::ingest::validate::{display_name, validate};
use crate::remote::ContentStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Dispatches documents from a directory to a [`ContentStore`] with a fixed worker count.
///
/// Each document is validated, uploaded and attached independently; a failure on one document
/// is folded into the report and never aborts the batch.
pub struct UploadCoordinator {
    store: Arc<dyn ContentStore>,
    accepted_extensions: Vec<String>,
}

impl UploadCoordinator {
    /// Build a coordinator accepting files whose extension is in `accepted_extensions`.
    pub fn new(store: Arc<dyn ContentStore>, accepted_extensions: Vec<String>) -> Self {
        let accepted_extensions = accepted_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            store,
            accepted_extensions,
        }
    }

    /// Upload every accepted document in `source_directory` and attach it to `store_id`.
    ///
    /// Returns once every dispatched document has an outcome. At most `concurrency_limit`
    /// documents are in flight at a time.
    pub async fn upload_batch(
        &self,
        source_directory: &Path,
        store_id: &str,
        concurrency_limit: usize,
    ) -> UploadReport {
        let batch_id = uuid::Uuid::new_v4();
        let files = match self.discover(source_directory) {
            Ok(files) => files,
            Err(error) => {
                tracing::error!(
                    %batch_id,
                    directory = %source_directory.display(),
                    error = %error,
                    "Failed to read document directory"
                );
                return UploadReport::default();
            }
        };

        if files.is_empty() {
            tracing::warn!(
                %batch_id,
                directory = %source_directory.display(),
                "No documents found to upload"
            );
            return UploadReport::default();
        }

        let total = files.len();
        let workers = concurrency_limit.max(1);
        tracing::info!(%batch_id, total, workers, store_id, "Uploading documents");

        let permits = Arc::new(Semaphore::new(workers));
        let mut in_flight = JoinSet::new();
        let mut names = HashMap::with_capacity(total);

        for path in files {
            let name = display_name(&path);
            let permits = Arc::clone(&permits);
            let store = Arc::clone(&self.store);
            let store_id = store_id.to_string();
            let handle = in_flight.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return UploadOutcome::failed(display_name(&path), "worker pool closed");
                    }
                };
                upload_one(store.as_ref(), path, &store_id).await
            });
            names.insert(handle.id(), name);
        }

        let mut report = UploadReport::default();
        while let Some(joined) = in_flight.join_next_with_id().await {
            let outcome = match joined {
                Ok((_, outcome)) => outcome,
                Err(error) => {
                    let name = names
                        .get(&error.id())
                        .cloned()
                        .unwrap_or_else(|| "<unknown>".to_string());
                    UploadOutcome::failed(name, format!("upload task aborted: {error}"))
                }
            };
            match &outcome.error {
                None => tracing::debug!(
                    %batch_id,
                    document = %outcome.document,
                    completed = report.total + 1,
                    total,
                    "Document uploaded"
                ),
                Some(error) => tracing::warn!(
                    %batch_id,
                    document = %outcome.document,
                    error = %error,
                    "Document upload failed"
                ),
            }
            report.record(outcome);
        }

        debug_assert_eq!(report.total, total);
        tracing::info!(
            %batch_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Upload summary"
        );
        report
    }

    fn discover(&self, directory: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
        let mut files = Vec::new();
        for entry in WalkDir::new(directory)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() && self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.accepted_extensions.iter().any(|accepted| *accepted == ext))
    }
}

async fn upload_one(store: &dyn ContentStore, path: PathBuf, store_id: &str) -> UploadOutcome {
    let name = display_name(&path);
    let validated = tokio::task::spawn_blocking(move || validate(&path)).await;
    let document = match validated {
        Ok(Ok(document)) => document,
        Ok(Err(invalid)) => return UploadOutcome::failed(name, invalid.to_string()),
        Err(error) => return UploadOutcome::failed(name, format!("validation aborted: {error}")),
    };

    let file = match store.upload_file(&document.name, document.bytes).await {
        Ok(file) => file,
        Err(error) => return UploadOutcome::failed(name, error.to_string()),
    };

    match store.attach_file(store_id, &file.id).await {
        Ok(()) => UploadOutcome::success(name),
        Err(error) => UploadOutcome::failed(name, error.to_string()),
    }
}

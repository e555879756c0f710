use serde::Serialize;

use super::{ensure_accepting_uploads, IncomingFile, PipelineError, UploadService};
use crate::storage::models::{Event, Upload};

/// Aggregate of a batch submission. Every submitted file lands in exactly one
/// of the two lists, in submission order.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub successes: Vec<Upload>,
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.successes.len() + self.errors.len()
    }
}

/// Files processed so far out of the batch total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
}

impl UploadService {
    /// Submit several photos one after another. A failing file is recorded as
    /// `"file name: reason"` and the batch moves on.
    pub async fn submit_many(
        &self,
        files: Vec<IncomingFile>,
        event_id: &str,
        uploader_label: Option<&str>,
    ) -> BatchResult {
        self.submit_many_with_progress(files, event_id, uploader_label, |_| {})
            .await
    }

    /// Same as [`submit_many`](Self::submit_many), reporting progress after each file.
    pub async fn submit_many_with_progress<F>(
        &self,
        files: Vec<IncomingFile>,
        event_id: &str,
        uploader_label: Option<&str>,
        on_progress: F,
    ) -> BatchResult
    where
        F: FnMut(BatchProgress),
    {
        self.run_batch(files, event_id, None, uploader_label, on_progress)
            .await
    }

    /// Submit a batch into `event`, which already holds `current` uploads.
    /// Capacity is checked per file, so files past the photo limit fail like
    /// any other item while earlier ones are kept.
    pub async fn submit_many_into(
        &self,
        files: Vec<IncomingFile>,
        event: &Event,
        current: u64,
        uploader_label: Option<&str>,
    ) -> BatchResult {
        self.run_batch(files, &event.id, Some((event, current)), uploader_label, |_| {})
            .await
    }

    async fn run_batch<F>(
        &self,
        files: Vec<IncomingFile>,
        event_id: &str,
        capacity: Option<(&Event, u64)>,
        uploader_label: Option<&str>,
        mut on_progress: F,
    ) -> BatchResult
    where
        F: FnMut(BatchProgress),
    {
        let total = files.len();
        let mut result = BatchResult::default();

        for (index, file) in files.into_iter().enumerate() {
            let name = file.display_name().to_string();
            let outcome = match capacity {
                Some((event, current)) => {
                    let stored = current + result.successes.len() as u64;
                    match ensure_accepting_uploads(event, stored, 1) {
                        Ok(()) => self.submit(file, event_id, uploader_label, None).await,
                        Err(e) => Err(PipelineError::from(e)),
                    }
                }
                None => self.submit(file, event_id, uploader_label, None).await,
            };
            match outcome {
                Ok(upload) => result.successes.push(upload),
                Err(e) => {
                    tracing::debug!(event_id = %event_id, file = %name, error = %e, "Batch item failed");
                    result.errors.push(format!("{name}: {}", e.public_message()));
                }
            }
            on_progress(BatchProgress {
                current: index + 1,
                total,
            });
        }

        debug_assert_eq!(result.total(), total);
        tracing::info!(
            event_id = %event_id,
            total,
            succeeded = result.successes.len(),
            failed = result.errors.len(),
            "Batch upload finished"
        );
        result
    }
}

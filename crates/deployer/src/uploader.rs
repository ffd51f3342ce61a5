//! Parallel upload of build artifacts to the site bucket.
//!
//! Uploads run on spawned tokio tasks gated by a semaphore. Every task is
//! joined through a `FuturesUnordered` owned by the calling task, which is the
//! only writer of the [`UploadReport`]. A worker that panics still produces a
//! failed outcome for its own task, so the report always holds exactly one
//! outcome per submitted task.

use crate::artifacts;
use crate::remote::{ObjectStore, PutObjectRequest};
use frontdeploy_core::{
    DeploymentTarget, Error, Outcome, Result, UploadOutcome, UploadReport, UploadTask,
};
use futures::stream::{FuturesUnordered, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, Span, debug, debug_span, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;

pub const ORIGINAL_NAME_KEY: &str = "original-name";
pub const UPLOAD_HASH_KEY: &str = "upload-hash";

pub struct ParallelUploader {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    span: Span,
}

impl ParallelUploader {
    pub fn new(store: Arc<dyn ObjectStore>, span: Span) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
            span,
        }
    }

    /// Number of uploads allowed in flight at once (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fail unless the target bucket exists and is accessible.
    pub async fn verify_bucket(&self, target: &DeploymentTarget) -> Result<()> {
        let bucket = &target.bucket_name;
        match self.store.head_bucket(bucket).instrument(self.span.clone()).await {
            Ok(()) => {
                info!(parent: &self.span, bucket = %bucket, "Verified bucket exists");
                Ok(())
            }
            Err(e) => {
                error!(parent: &self.span, bucket = %bucket, error = %e, "Cannot access bucket");
                Err(e.with_context(format!("Cannot access S3 bucket {}", bucket)))
            }
        }
    }

    /// Upload `tasks` to the target bucket.
    ///
    /// Fails only when the bucket cannot be reached, before any upload starts.
    /// Otherwise every task is attempted and reported, whatever its siblings do.
    pub async fn upload_files(
        &self,
        target: &DeploymentTarget,
        tasks: Vec<UploadTask>,
    ) -> Result<UploadReport> {
        self.verify_bucket(target).await?;
        Ok(self.fan_out(&target.bucket_name, tasks).await)
    }

    /// Enumerate `root` and upload everything beneath it.
    ///
    /// Success requires every file to upload; a partial failure still carries
    /// the complete report.
    pub async fn upload(&self, target: &DeploymentTarget, root: &Path) -> Outcome<UploadReport> {
        info!(parent: &self.span, root = %root.display(), "Starting S3 upload process");

        if let Err(e) = self.verify_bucket(target).await {
            return Outcome::from_error(&e);
        }

        let tasks = match artifacts::collect(root) {
            Ok(tasks) => tasks,
            Err(e) => return Outcome::from_error(&e),
        };
        if tasks.is_empty() {
            return Outcome::from_error(&Error::Configuration(
                "No files found to upload".to_string(),
            ));
        }
        info!(parent: &self.span, files = tasks.len(), "Found files to upload");

        let report = self.fan_out(&target.bucket_name, tasks).await;
        if report.is_complete_success() {
            Outcome::Success(report)
        } else {
            let err = Error::PartialUpload {
                failed: report.failed,
                total: report.total,
            };
            Outcome::Failure {
                kind: err.kind(),
                message: err.to_string(),
                partial: Some(report),
            }
        }
    }

    async fn fan_out(&self, bucket: &str, tasks: Vec<UploadTask>) -> UploadReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|task| {
                let store = Arc::clone(&self.store);
                let semaphore = Arc::clone(&semaphore);
                let bucket = bucket.to_string();
                let span = debug_span!(parent: &self.span, "upload", key = %task.remote_key);
                let worker_task = task.clone();

                let handle = tokio::spawn(
                    async move {
                        let _permit = semaphore.acquire_owned().await;
                        put_task(store.as_ref(), &bucket, worker_task).await
                    }
                    .instrument(span),
                );

                async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            UploadOutcome::failed(task, format!("Upload worker failed: {}", e))
                        }
                    }
                }
            })
            .collect();

        let mut report = UploadReport::with_capacity(pending.len());
        while let Some(outcome) = pending.next().await {
            if outcome.success {
                info!(parent: &self.span, key = %outcome.task.remote_key, "Uploaded");
            } else {
                error!(
                    parent: &self.span,
                    key = %outcome.task.remote_key,
                    error = outcome.error.as_deref().unwrap_or("unknown error"),
                    "Upload failed"
                );
            }
            report.record(outcome);
        }

        info!(
            parent: &self.span,
            "Upload completed: {}/{} files ({:.1}%), {:.2} MB",
            report.succeeded,
            report.total,
            report.success_rate(),
            report.total_megabytes()
        );
        if report.failed > 0 {
            warn!(parent: &self.span, "{} files failed to upload", report.failed);
        }
        report
    }
}

async fn put_task(store: &dyn ObjectStore, bucket: &str, task: UploadTask) -> UploadOutcome {
    let body = match tokio::fs::read(&task.local_path).await {
        Ok(body) => body,
        Err(e) => {
            let message = format!("Failed to read {}: {}", task.local_path.display(), e);
            return UploadOutcome::failed(task, message);
        }
    };

    let size_bytes = body.len() as u64;
    let checksum = sha256_hex(&body);
    let original_name = task
        .local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| task.remote_key.clone());

    let mut metadata = BTreeMap::new();
    metadata.insert(ORIGINAL_NAME_KEY.to_string(), original_name);
    metadata.insert(UPLOAD_HASH_KEY.to_string(), checksum.clone());

    debug!(
        bucket,
        key = %task.remote_key,
        content_type = %task.content_type,
        cache_control = %task.cache_control,
        size_bytes,
        "Uploading"
    );

    let request = PutObjectRequest {
        bucket: bucket.to_string(),
        key: task.remote_key.clone(),
        body,
        content_type: task.content_type.clone(),
        cache_control: task.cache_control.clone(),
        metadata,
    };

    match store.put_object(request).await {
        Ok(()) => UploadOutcome::succeeded(task, size_bytes, checksum),
        Err(e) => UploadOutcome::failed(task, e.to_string()),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

//! CloudFront cache invalidation.
//!
//! CloudFront bills per invalidated path, so requests are normalized and
//! collapsed to a single wildcard once they exceed [`MAX_DISCRETE_PATHS`].

use crate::remote::CdnControl;
use frontdeploy_core::{DeploymentTarget, Error, InvalidationRequest, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, warn};

pub const WILDCARD: &str = "/*";

/// Largest number of distinct paths submitted individually
pub const MAX_DISCRETE_PATHS: usize = 5;

/// Normalize, deduplicate and sort `paths`, falling back to [`WILDCARD`]
/// when nothing specific was asked for or too much was.
pub fn optimize_paths(paths: &[String]) -> Vec<String> {
    let unique: BTreeSet<String> = paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{}", p)
            }
        })
        .collect();

    if unique.is_empty() || unique.len() > MAX_DISCRETE_PATHS || unique.contains(WILDCARD) {
        return vec![WILDCARD.to_string()];
    }
    unique.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(900),
        }
    }
}

/// How waiting on an invalidation ended, as observed locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WaitOutcome {
    Completed { elapsed: Duration },
    TimedOut { elapsed: Duration },
    PollFailed { message: String },
}

impl WaitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WaitOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidationReport {
    pub distribution_id: String,
    pub distribution_domain: String,
    pub invalidation_id: String,
    pub status: String,
    pub request: InvalidationRequest,
    /// Present only when the caller asked to wait
    pub wait: Option<WaitOutcome>,
}

impl InvalidationReport {
    pub fn warning(&self) -> Option<&'static str> {
        match &self.wait {
            Some(WaitOutcome::TimedOut { .. }) => {
                Some("Invalidation did not complete within timeout")
            }
            Some(WaitOutcome::PollFailed { .. }) => {
                Some("Invalidation status could not be confirmed")
            }
            _ => None,
        }
    }
}

pub struct CacheInvalidator {
    cdn: Arc<dyn CdnControl>,
    project_name: String,
    poll: PollSettings,
    span: Span,
}

impl CacheInvalidator {
    pub fn new(cdn: Arc<dyn CdnControl>, project_name: impl Into<String>, span: Span) -> Self {
        Self {
            cdn,
            project_name: project_name.into(),
            poll: PollSettings::default(),
            span,
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Caller reference that makes each request unique per second
    pub fn reference_id(&self, target: &DeploymentTarget) -> String {
        format!(
            "{}-{}-{}",
            self.project_name,
            target.environment,
            chrono::Utc::now().timestamp()
        )
    }

    /// Invalidate `paths` (everything when `None`) on the target distribution,
    /// optionally waiting for CloudFront to finish.
    ///
    /// Waiting never fails the call: a timeout or polling error is recorded in
    /// the report and the server-side invalidation carries on.
    pub async fn invalidate(
        &self,
        target: &DeploymentTarget,
        paths: Option<&[String]>,
        wait: bool,
    ) -> Result<InvalidationReport> {
        let distribution = self
            .cdn
            .get_distribution(&target.distribution_id)
            .instrument(self.span.clone())
            .await?;
        info!(
            parent: &self.span,
            "Target distribution: {} ({})",
            distribution.domain_name,
            distribution.status
        );
        if !distribution.enabled {
            return Err(Error::PermanentRemote(format!(
                "Distribution {} is not enabled",
                distribution.id
            )));
        }

        let request = InvalidationRequest {
            paths: optimize_paths(paths.unwrap_or_default()),
            reference_id: self.reference_id(target),
        };
        info!(parent: &self.span, paths = request.paths.len(), "Creating invalidation");
        debug!(parent: &self.span, paths = ?request.paths, "Paths to invalidate");

        let created = self
            .cdn
            .create_invalidation(&target.distribution_id, &request.paths, &request.reference_id)
            .instrument(self.span.clone())
            .await?;
        info!(
            parent: &self.span,
            invalidation_id = %created.id,
            status = %created.status,
            "Invalidation created"
        );

        let wait = if wait {
            Some(self.wait_for_completion(target, &created.id).await)
        } else {
            None
        };

        Ok(InvalidationReport {
            distribution_id: target.distribution_id.clone(),
            distribution_domain: distribution.domain_name,
            invalidation_id: created.id,
            status: created.status,
            request,
            wait,
        })
    }

    /// Poll until the invalidation reports `Completed` or the timeout passes.
    pub async fn wait_for_completion(
        &self,
        target: &DeploymentTarget,
        invalidation_id: &str,
    ) -> WaitOutcome {
        info!(parent: &self.span, invalidation_id, "Waiting for invalidation to complete");
        let started = Instant::now();

        loop {
            let state = match self
                .cdn
                .get_invalidation(&target.distribution_id, invalidation_id)
                .instrument(self.span.clone())
                .await
            {
                Ok(state) => state,
                Err(e) => {
                    warn!(parent: &self.span, error = %e, "Error checking invalidation status");
                    return WaitOutcome::PollFailed {
                        message: e.to_string(),
                    };
                }
            };

            let elapsed = started.elapsed();
            if state.is_completed() {
                info!(parent: &self.span, "Invalidation completed in {}s", elapsed.as_secs());
                return WaitOutcome::Completed { elapsed };
            }
            if state.status == "InProgress" {
                info!(
                    parent: &self.span,
                    "Invalidation in progress ({}s elapsed)",
                    elapsed.as_secs()
                );
            } else {
                warn!(parent: &self.span, status = %state.status, "Unexpected invalidation status");
            }

            if elapsed >= self.poll.timeout {
                warn!(parent: &self.span, "Invalidation timeout after {}s", elapsed.as_secs());
                return WaitOutcome::TimedOut { elapsed };
            }
            let remaining = self.poll.timeout - elapsed;
            tokio::time::sleep(self.poll.interval.min(remaining)).await;
        }
    }
}

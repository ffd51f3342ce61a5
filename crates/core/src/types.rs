use crate::error::{Error, ErrorKind};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Stage,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Stage, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "stage" => Ok(Environment::Stage),
            "prod" => Ok(Environment::Prod),
            other => Err(Error::Configuration(format!(
                "Invalid environment: {}. Must be one of: dev, stage, prod",
                other
            ))),
        }
    }
}

/// Resolved infrastructure identifiers for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    pub environment: Environment,
    pub bucket_name: String,
    pub distribution_id: String,
    pub distribution_domain_name: String,
    pub website_url: String,
    pub region: String,
}

/// A single file scheduled for upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub content_type: String,
    pub cache_control: String,
}

/// Result of uploading one [`UploadTask`]
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub task: UploadTask,
    pub success: bool,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(task: UploadTask, size_bytes: u64, checksum: String) -> Self {
        Self {
            task,
            success: true,
            size_bytes,
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn failed(task: UploadTask, error: impl Into<String>) -> Self {
        Self {
            task,
            success: false,
            size_bytes: 0,
            checksum: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of every [`UploadOutcome`] in a run.
///
/// `succeeded + failed == total` holds after every [`UploadReport::record`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: UploadOutcome) {
        self.total += 1;
        if outcome.success {
            self.succeeded += 1;
            self.total_bytes += outcome.size_bytes;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Percentage of files uploaded, 0.0 for an empty report
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }

    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn successes(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Paths submitted in a single CDN invalidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationRequest {
    pub paths: Vec<String>,
    pub reference_id: String,
}

/// Tagged result of an operation that may carry partial progress on failure
#[derive(Debug, Clone, Serialize)]
pub enum Outcome<T> {
    Success(T),
    Failure {
        kind: ErrorKind,
        message: String,
        partial: Option<T>,
    },
}

impl<T> Outcome<T> {
    pub fn from_error(err: &Error) -> Self {
        Outcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
            partial: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Details of a success, or whatever partial details a failure kept
    pub fn details(&self) -> Option<&T> {
        match self {
            Outcome::Success(details) => Some(details),
            Outcome::Failure { partial, .. } => partial.as_ref(),
        }
    }
}

/// Helper to format a byte count as megabytes with two decimals
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

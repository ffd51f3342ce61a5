// Deployment pipeline for a static frontend hosted on S3 behind CloudFront

pub mod artifacts;
pub mod aws;
pub mod builder;
pub mod content;
pub mod invalidator;
pub mod orchestrator;
pub mod remote;
pub mod resolver;
pub mod uploader;

#[cfg(test)]
mod fakes;

pub use aws::AwsClients;
pub use builder::{BuildTool, NpmBuild};
pub use invalidator::{CacheInvalidator, InvalidationReport, PollSettings, WaitOutcome};
pub use orchestrator::{
    Collaborators, DeployOptions, DeployStep, DeploymentOrchestrator, DeploymentReport,
    StepReport, StepStatus,
};
pub use resolver::{ConfigResolver, RetryPolicy};
pub use uploader::ParallelUploader;

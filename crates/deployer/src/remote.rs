//! Seams to the remote services a deployment talks to.
//!
//! The AWS-backed implementations live in [`crate::aws`]; tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use frontdeploy_core::Result;
use std::collections::BTreeMap;

/// Read-only view of provisioned stack outputs (CloudFormation `DescribeStacks`)
#[async_trait]
pub trait StackOutputs: Send + Sync {
    /// Ordered `(OutputKey, OutputValue)` pairs of `stack_name`
    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<(String, String)>>;
}

/// A single object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    pub metadata: BTreeMap<String, String>,
}

/// Object store the site files are written to (S3)
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Succeeds when `bucket` exists and is accessible with current credentials
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Write one object, overwriting any existing object at the same key
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionInfo {
    pub id: String,
    pub domain_name: String,
    pub status: String,
    pub enabled: bool,
}

/// Snapshot of an invalidation as reported by the CDN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationState {
    pub id: String,
    pub status: String,
}

impl InvalidationState {
    pub const COMPLETED: &'static str = "Completed";

    pub fn is_completed(&self) -> bool {
        self.status == Self::COMPLETED
    }
}

/// CDN control plane (CloudFront)
#[async_trait]
pub trait CdnControl: Send + Sync {
    async fn get_distribution(&self, distribution_id: &str) -> Result<DistributionInfo>;

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        reference_id: &str,
    ) -> Result<InvalidationState>;

    async fn get_invalidation(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationState>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_id: String,
    pub user_arn: String,
    pub user_id: String,
}

/// Identity behind the current credentials (STS `GetCallerIdentity`)
#[async_trait]
pub trait CallerIdentity: Send + Sync {
    async fn caller_identity(&self) -> Result<AccountInfo>;
}

// AWS-backed implementations of the remote seams

mod errors;

use crate::remote::{
    AccountInfo, CallerIdentity, CdnControl, DistributionInfo, InvalidationState,
    ObjectStore, PutObjectRequest, StackOutputs,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::primitives::ByteStream;
use errors::classify_sdk_error;
use frontdeploy_core::{EnvironmentSettings, Error, Result};
use tracing::debug;

/// Shared SDK configuration for one environment's region and profile
#[derive(Clone)]
pub struct AwsClients {
    config: SdkConfig,
}

impl AwsClients {
    /// Load region/profile from settings and make sure credentials resolve.
    pub async fn load(settings: &EnvironmentSettings) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.aws_region.clone()));
        if let Some(profile) = &settings.aws_profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        let provider = config.credentials_provider().ok_or_else(|| {
            Error::Credential(
                "AWS credentials not found. Please configure AWS credentials.".to_string(),
            )
        })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| Error::Credential(format!("AWS credentials could not be loaded: {}", e)))?;

        debug!(region = %settings.aws_region, "Loaded AWS configuration");
        Ok(Self { config })
    }

    pub fn stack_outputs(&self) -> CloudFormationOutputs {
        CloudFormationOutputs {
            client: aws_sdk_cloudformation::Client::new(&self.config),
        }
    }

    pub fn object_store(&self) -> S3Store {
        S3Store {
            client: aws_sdk_s3::Client::new(&self.config),
        }
    }

    pub fn cdn(&self) -> CloudFrontCdn {
        CloudFrontCdn {
            client: aws_sdk_cloudfront::Client::new(&self.config),
        }
    }

    pub fn identity(&self) -> StsIdentity {
        StsIdentity {
            client: aws_sdk_sts::Client::new(&self.config),
        }
    }
}

pub struct CloudFormationOutputs {
    client: aws_sdk_cloudformation::Client,
}

#[async_trait]
impl StackOutputs for CloudFormationOutputs {
    async fn describe_outputs(&self, stack_name: &str) -> Result<Vec<(String, String)>> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error("DescribeStacks", e))?;

        let stack = output.stacks().first().ok_or_else(|| {
            Error::PermanentRemote(format!("Stack {} not found", stack_name))
        })?;

        Ok(stack
            .outputs()
            .iter()
            .filter_map(|o| {
                Some((
                    o.output_key()?.to_string(),
                    o.output_value()?.to_string(),
                ))
            })
            .collect())
    }
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error("HeadBucket", e))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        let mut put = self
            .client
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(ByteStream::from(request.body))
            .content_type(request.content_type)
            .cache_control(request.cache_control);
        for (name, value) in request.metadata {
            put = put.metadata(name, value);
        }

        put.send()
            .await
            .map(|_| ())
            .map_err(|e| classify_sdk_error("PutObject", e))
    }
}

pub struct CloudFrontCdn {
    client: aws_sdk_cloudfront::Client,
}

#[async_trait]
impl CdnControl for CloudFrontCdn {
    async fn get_distribution(&self, distribution_id: &str) -> Result<DistributionInfo> {
        let output = self
            .client
            .get_distribution()
            .id(distribution_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error("GetDistribution", e))?;

        let distribution = output.distribution().ok_or_else(|| {
            Error::PermanentRemote(format!("Distribution not found: {}", distribution_id))
        })?;

        Ok(DistributionInfo {
            id: distribution.id().to_string(),
            domain_name: distribution.domain_name().to_string(),
            status: distribution.status().to_string(),
            enabled: distribution
                .distribution_config()
                .map(|c| c.enabled())
                .unwrap_or(false),
        })
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        reference_id: &str,
    ) -> Result<InvalidationState> {
        let paths = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| Error::PermanentRemote(format!("Invalid invalidation paths: {}", e)))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(reference_id)
            .build()
            .map_err(|e| Error::PermanentRemote(format!("Invalid invalidation batch: {}", e)))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| classify_sdk_error("CreateInvalidation", e))?;

        let invalidation = output.invalidation().ok_or_else(|| {
            Error::PermanentRemote("CreateInvalidation returned no invalidation".to_string())
        })?;

        Ok(InvalidationState {
            id: invalidation.id().to_string(),
            status: invalidation.status().to_string(),
        })
    }

    async fn get_invalidation(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationState> {
        let output = self
            .client
            .get_invalidation()
            .distribution_id(distribution_id)
            .id(invalidation_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error("GetInvalidation", e))?;

        let invalidation = output.invalidation().ok_or_else(|| {
            Error::PermanentRemote(format!("Invalidation not found: {}", invalidation_id))
        })?;

        Ok(InvalidationState {
            id: invalidation.id().to_string(),
            status: invalidation.status().to_string(),
        })
    }
}

pub struct StsIdentity {
    client: aws_sdk_sts::Client,
}

#[async_trait]
impl CallerIdentity for StsIdentity {
    async fn caller_identity(&self) -> Result<AccountInfo> {
        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| match classify_sdk_error("GetCallerIdentity", e) {
                transient @ Error::TransientRemote(_) => transient,
                other => Error::Credential(other.to_string()),
            })?;

        Ok(AccountInfo {
            account_id: output.account().unwrap_or_default().to_string(),
            user_arn: output.arn().unwrap_or_default().to_string(),
            user_id: output.user_id().unwrap_or_default().to_string(),
        })
    }
}

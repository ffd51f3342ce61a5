//! Resolution of an environment to its deployed resource identifiers.

use crate::remote::StackOutputs;
use frontdeploy_core::{DeploymentTarget, Environment, EnvironmentSettings, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, info, warn};

pub const BUCKET_NAME_OUTPUT: &str = "BucketName";
pub const DISTRIBUTION_ID_OUTPUT: &str = "DistributionId";
pub const DISTRIBUTION_DOMAIN_OUTPUT: &str = "DistributionDomainName";
pub const WEBSITE_URL_OUTPUT: &str = "WebsiteUrl";

/// Exponential backoff: `base_delay`, then doubling, for at most `max_attempts` tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &EnvironmentSettings) -> Self {
        Self {
            max_attempts: settings.retry_attempts.max(1),
            base_delay: settings.retry_base_delay,
        }
    }

    /// Delay after the failed `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

pub struct ConfigResolver {
    stacks: Arc<dyn StackOutputs>,
    policy: RetryPolicy,
    span: Span,
}

impl ConfigResolver {
    pub fn new(stacks: Arc<dyn StackOutputs>, policy: RetryPolicy, span: Span) -> Self {
        Self {
            stacks,
            policy,
            span,
        }
    }

    /// Resolve the target for `settings.environment` from its stack outputs.
    ///
    /// Query failures and missing outputs are retried with backoff. Credential
    /// and configuration errors are returned at once. After the last attempt
    /// the failure is reported as permanent, naming the stack.
    pub async fn resolve(&self, settings: &EnvironmentSettings) -> Result<DeploymentTarget> {
        let stack_name = settings.stack_name();
        let mut attempt = 1;

        loop {
            let result = self
                .query(&stack_name, settings.environment, &settings.aws_region)
                .instrument(self.span.clone())
                .await;

            let err = match result {
                Ok(target) => {
                    info!(
                        parent: &self.span,
                        stack = %stack_name,
                        bucket = %target.bucket_name,
                        distribution = %target.distribution_id,
                        "Resolved deployment target"
                    );
                    return Ok(target);
                }
                Err(err @ (Error::Credential(_) | Error::Configuration(_))) => return Err(err),
                Err(err) => err,
            };

            if attempt >= self.policy.max_attempts {
                return Err(Error::PermanentRemote(format!(
                    "Failed to get CloudFormation outputs for stack {} after {} attempts: {}",
                    stack_name, attempt, err
                )));
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                parent: &self.span,
                stack = %stack_name,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                "Stack lookup failed, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn query(
        &self,
        stack_name: &str,
        environment: Environment,
        region: &str,
    ) -> Result<DeploymentTarget> {
        let outputs = self.stacks.describe_outputs(stack_name).await?;
        target_from_outputs(stack_name, environment, region, &outputs)
    }
}

/// Build a target from raw stack outputs, failing on any missing key
pub fn target_from_outputs(
    stack_name: &str,
    environment: Environment,
    region: &str,
    outputs: &[(String, String)],
) -> Result<DeploymentTarget> {
    let lookup = |key: &str| -> Result<String> {
        outputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                Error::PermanentRemote(format!("{} not found in {} outputs", key, stack_name))
            })
    };

    Ok(DeploymentTarget {
        environment,
        bucket_name: lookup(BUCKET_NAME_OUTPUT)?,
        distribution_id: lookup(DISTRIBUTION_ID_OUTPUT)?,
        distribution_domain_name: lookup(DISTRIBUTION_DOMAIN_OUTPUT)?,
        website_url: lookup(WEBSITE_URL_OUTPUT)?,
        region: region.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ScriptedStacks, stack_outputs_for};
    use frontdeploy_core::ErrorKind;
    use std::path::PathBuf;

    fn settings() -> EnvironmentSettings {
        EnvironmentSettings {
            environment: Environment::Dev,
            aws_region: "us-west-2".to_string(),
            aws_profile: None,
            project_name: "healthmate-frontend".to_string(),
            stack_prefix: "Healthmate-FrontendStack".to_string(),
            dist_dir: PathBuf::from("dist"),
            build_tool: "npm".to_string(),
            build_timeout: Duration::from_secs(600),
            build_env_var: "DEPLOY_ENV".to_string(),
            upload_concurrency: 5,
            retry_attempts: 10,
            retry_base_delay: Duration::from_secs(2),
            enable_cache_invalidation: false,
            log_level: "info".to_string(),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    fn throttled() -> Result<Vec<(String, String)>> {
        Err(Error::TransientRemote(
            "DescribeStacks: Throttling - Rate exceeded".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let stacks = Arc::new(ScriptedStacks::new(vec![
            throttled(),
            throttled(),
            throttled(),
            Ok(stack_outputs_for("healthmate-frontend-dev", "E2EXAMPLE")),
        ]));
        let resolver = ConfigResolver::new(stacks.clone(), fast_policy(10), Span::none());

        let target = resolver.resolve(&settings()).await.unwrap();

        assert_eq!(stacks.calls(), 4);
        assert_eq!(target.environment, Environment::Dev);
        assert_eq!(target.bucket_name, "healthmate-frontend-dev");
        assert_eq!(target.distribution_id, "E2EXAMPLE");
        assert_eq!(target.distribution_domain_name, "e2example.cloudfront.net");
        assert_eq!(target.region, "us-west-2");
    }

    #[tokio::test]
    async fn test_exhaustion_names_the_stack() {
        let stacks = Arc::new(ScriptedStacks::new(vec![throttled()]));
        let resolver = ConfigResolver::new(stacks.clone(), fast_policy(3), Span::none());

        let err = resolver.resolve(&settings()).await.unwrap_err();

        assert_eq!(stacks.calls(), 3);
        assert_eq!(err.kind(), ErrorKind::PermanentRemote);
        assert!(err.to_string().contains("Healthmate-FrontendStack-dev"));
        assert!(err.to_string().contains("Throttling"));
    }

    #[tokio::test]
    async fn test_missing_output_is_retried() {
        let mut partial = stack_outputs_for("bucket", "E2EXAMPLE");
        partial.retain(|(k, _)| k != WEBSITE_URL_OUTPUT);
        let stacks = Arc::new(ScriptedStacks::new(vec![
            Ok(partial),
            Ok(stack_outputs_for("bucket", "E2EXAMPLE")),
        ]));
        let resolver = ConfigResolver::new(stacks.clone(), fast_policy(5), Span::none());

        let target = resolver.resolve(&settings()).await.unwrap();
        assert_eq!(stacks.calls(), 2);
        assert_eq!(target.website_url, "https://e2example.cloudfront.net");
    }

    #[tokio::test]
    async fn test_credential_errors_are_not_retried() {
        let stacks = Arc::new(ScriptedStacks::new(vec![Err(Error::Credential(
            "ExpiredToken".to_string(),
        ))]));
        let resolver = ConfigResolver::new(stacks.clone(), fast_policy(5), Span::none());

        let err = resolver.resolve(&settings()).await.unwrap_err();
        assert_eq!(stacks.calls(), 1);
        assert_eq!(err.kind(), ErrorKind::Credential);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(9), Duration::from_secs(512));
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from_settings(&settings());
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_target_from_outputs_reports_missing_key() {
        let err = target_from_outputs("S", Environment::Prod, "us-east-1", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Remote error: BucketName not found in S outputs");
    }
}

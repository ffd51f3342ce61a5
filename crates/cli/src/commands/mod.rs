pub mod deploy;
pub mod invalidate;
pub mod rollback;
pub mod status;
pub mod upload;

use anyhow::{Context, Result};
use frontdeploy_core::{DeploymentTarget, EnvironmentSettings, UploadReport};
use frontdeploy_deployer::remote::CallerIdentity;
use frontdeploy_deployer::{AwsClients, ConfigResolver, RetryPolicy};
use std::sync::Arc;
use tracing::info_span;

/// SDK clients for the environment's region and profile
async fn connect(settings: &EnvironmentSettings) -> Result<AwsClients> {
    AwsClients::load(settings)
        .await
        .context("Failed to initialize AWS clients")
}

async fn validate_credentials(clients: &AwsClients) -> Result<()> {
    let account = clients.identity().caller_identity().await.context(
        "AWS credentials not configured or invalid. \
         Configure them with 'aws configure' or environment variables",
    )?;
    println!("✅ AWS credentials validated ({})", account.user_arn);
    Ok(())
}

async fn resolve_target(
    settings: &EnvironmentSettings,
    clients: &AwsClients,
) -> Result<DeploymentTarget> {
    let resolver = ConfigResolver::new(
        Arc::new(clients.stack_outputs()),
        RetryPolicy::from_settings(settings),
        info_span!("resolve", env = %settings.environment),
    );
    resolver
        .resolve(settings)
        .await
        .with_context(|| format!("Failed to resolve stack {}", settings.stack_name()))
}

fn print_upload_stats(report: &UploadReport) {
    println!("📊 Upload statistics:");
    println!("   Files: {}/{}", report.succeeded, report.total);
    println!("   Size: {:.2} MB", report.total_megabytes());
    println!("   Success rate: {:.1}%", report.success_rate());
}

/// Failed keys and a retry hint after a partial upload
fn print_upload_failures(report: &UploadReport) {
    for outcome in report.failures() {
        println!(
            "   ❌ {}: {}",
            outcome.task.remote_key,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "   {} file(s) remain to retry; run the upload again to resend them",
        report.failed
    );
}

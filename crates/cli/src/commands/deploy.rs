use anyhow::{Result, bail};
use frontdeploy_core::{EnvironmentSettings, format_megabytes};
use frontdeploy_deployer::{
    Collaborators, DeployOptions, DeploymentOrchestrator, DeploymentReport, NpmBuild, StepStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info_span;

use super::{connect, print_upload_failures};

pub async fn run(
    settings: EnvironmentSettings,
    project_root: PathBuf,
    skip_build: bool,
    max_workers: Option<usize>,
) -> Result<()> {
    println!("🚀 Deploying {} to {}", settings.project_name, settings.environment);

    let clients = connect(&settings).await?;
    let collaborators = Collaborators {
        stacks: Arc::new(clients.stack_outputs()),
        store: Arc::new(clients.object_store()),
        identity: Arc::new(clients.identity()),
        build_tool: Arc::new(
            NpmBuild::new(&settings.build_tool, settings.build_timeout)
                .with_env_var(&settings.build_env_var),
        ),
    };
    let span = info_span!("deploy", env = %settings.environment);
    let invalidation_enabled = settings.enable_cache_invalidation;

    let mut orchestrator =
        DeploymentOrchestrator::new(settings, project_root, collaborators, span);
    if let Some(workers) = max_workers {
        orchestrator = orchestrator.with_concurrency(workers);
    }

    let report = orchestrator.deploy(DeployOptions { skip_build }).await;
    print_summary(&report);

    if let Some((_, _, message)) = report.failure() {
        bail!("Deployment failed: {}", message);
    }

    if invalidation_enabled {
        println!(
            "\nℹ️  Run 'frontdeploy invalidate {}' to refresh cached content",
            report.environment
        );
    } else {
        println!("\nℹ️  CloudFront caching is disabled, changes are visible immediately");
    }
    Ok(())
}

fn print_summary(report: &DeploymentReport) {
    if report.is_success() {
        println!("\n🎉 Deployment completed successfully!");
    } else {
        println!("\n❌ Deployment failed");
    }
    println!("🌍 Environment: {}", report.environment);
    println!("⏱️  Total time: {:.1}s", report.total_duration.as_secs_f64());

    for step in &report.steps {
        let name = step.step.to_string();
        match &step.status {
            StepStatus::Succeeded => {
                println!("✅ {}: {:.1}s", name, step.duration.as_secs_f64())
            }
            StepStatus::Skipped => println!("⏭️  {}: Skipped", name),
            StepStatus::Failed { kind, message } => {
                println!("❌ {}: Failed ({}) - {}", name, kind, message)
            }
        }
    }

    if let Some(account) = &report.account {
        println!("👤 Account: {}", account.account_id);
    }
    if let Some(target) = &report.target {
        println!("🪣 Bucket: {}", target.bucket_name);
        println!("📡 Distribution: {}", target.distribution_id);
        println!("🔗 Website: {}", target.website_url);
    }
    if let Some(build) = &report.build {
        println!(
            "🔨 Build: {} files, {}",
            build.total_files,
            format_megabytes(build.total_bytes)
        );
    }
    if let Some(upload) = &report.upload {
        println!(
            "📊 Upload: {}/{} files, {:.2} MB",
            upload.succeeded,
            upload.total,
            upload.total_megabytes()
        );
        if upload.failed > 0 {
            print_upload_failures(upload);
        }
    }
}

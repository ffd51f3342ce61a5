use anyhow::{Context, Result, bail};
use frontdeploy_core::{EnvironmentSettings, Outcome, format_megabytes};
use frontdeploy_deployer::{ParallelUploader, artifacts};
use frontdeploy_validator::validate_build_output;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info_span;

use super::{
    connect, print_upload_failures, print_upload_stats, resolve_target, validate_credentials,
};

pub async fn run(
    settings: EnvironmentSettings,
    project_root: PathBuf,
    max_workers: Option<usize>,
    validate_aws: bool,
    dry_run: bool,
) -> Result<()> {
    let dist = project_root.join(&settings.dist_dir);
    if dry_run {
        return plan(&dist);
    }

    let clients = connect(&settings).await?;
    if validate_aws {
        validate_credentials(&clients).await?;
    }
    let target = resolve_target(&settings, &clients).await?;

    let uploader = ParallelUploader::new(
        Arc::new(clients.object_store()),
        info_span!("upload", env = %settings.environment),
    )
    .with_concurrency(max_workers.unwrap_or(settings.upload_concurrency));

    match uploader.upload(&target, &dist).await {
        Outcome::Success(report) => {
            println!("\n✅ Upload completed successfully to {}", target.bucket_name);
            println!("🌍 Environment: {}", settings.environment);
            print_upload_stats(&report);
            Ok(())
        }
        Outcome::Failure {
            message, partial, ..
        } => {
            println!("\n❌ Upload failed to {}", target.bucket_name);
            println!("Environment: {}", settings.environment);
            println!("Error: {}", message);
            if let Some(report) = partial {
                println!(
                    "Partial results: {}/{} files uploaded",
                    report.succeeded, report.total
                );
                print_upload_failures(&report);
            }
            bail!("Upload failed: {}", message)
        }
    }
}

/// Print the planned uploads without touching the bucket
fn plan(dist: &Path) -> Result<()> {
    let stats = validate_build_output(dist).context("Build output is not deployable")?;
    let tasks = artifacts::collect(dist)?;

    println!("📋 Dry run: {} files from {}", tasks.len(), dist.display());
    for task in &tasks {
        let size = std::fs::metadata(&task.local_path)
            .map(|m| m.len())
            .unwrap_or(0);
        println!("   {}  {}  {} bytes", task.remote_key, task.content_type, size);
    }
    println!("   Total: {}", format_megabytes(stats.total_bytes));
    Ok(())
}

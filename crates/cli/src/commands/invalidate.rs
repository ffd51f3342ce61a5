use anyhow::{Result, bail};
use frontdeploy_core::{EnvironmentSettings, Error};
use frontdeploy_deployer::{CacheInvalidator, InvalidationReport, WaitOutcome};
use std::sync::Arc;
use tracing::info_span;

use super::{connect, resolve_target, validate_credentials};

pub async fn run(
    settings: EnvironmentSettings,
    paths: Vec<String>,
    wait: bool,
    validate_aws: bool,
) -> Result<()> {
    let clients = connect(&settings).await?;
    if validate_aws {
        validate_credentials(&clients).await?;
    }
    let target = resolve_target(&settings, &clients).await?;

    let invalidator = CacheInvalidator::new(
        Arc::new(clients.cdn()),
        &settings.project_name,
        info_span!("invalidate", env = %settings.environment),
    );
    let requested = (!paths.is_empty()).then_some(paths.as_slice());

    match invalidator.invalidate(&target, requested, wait).await {
        Ok(report) => {
            print_report(&report, &settings);
            Ok(())
        }
        Err(e) => {
            println!("\n❌ Invalidation failed");
            println!("Environment: {}", settings.environment);
            println!("Distribution: {}", target.distribution_id);
            println!("Error: {}", e);
            if matches!(e, Error::TooManyInvalidations) {
                println!(
                    "ℹ️  CloudFront limits concurrent invalidations; retry once one finishes"
                );
            }
            bail!(e)
        }
    }
}

fn print_report(report: &InvalidationReport, settings: &EnvironmentSettings) {
    println!("\n✅ Invalidation created successfully");
    println!("🌍 Environment: {}", settings.environment);
    println!("📡 Distribution: {}", report.distribution_domain);
    println!("🔄 Invalidation ID: {}", report.invalidation_id);
    println!("📁 Paths: {}", report.request.paths.join(", "));

    match &report.wait {
        Some(WaitOutcome::Completed { elapsed }) => {
            println!("✅ Invalidation completed in {:.0}s", elapsed.as_secs_f64())
        }
        Some(WaitOutcome::TimedOut { .. }) | Some(WaitOutcome::PollFailed { .. }) => {
            println!("⏰ Invalidation is still in progress");
            if let Some(warning) = report.warning() {
                println!("⚠️  {}", warning);
            }
        }
        None => println!("ℹ️  Use --wait to monitor completion"),
    }
}

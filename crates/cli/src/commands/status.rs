use anyhow::{Context, Result};
use frontdeploy_core::EnvironmentSettings;
use frontdeploy_deployer::remote::{CallerIdentity, CdnControl};
use serde_json::json;

use super::{connect, resolve_target};

pub async fn run(settings: EnvironmentSettings, as_json: bool) -> Result<()> {
    if !as_json {
        println!("📊 Checking deployment status...\n");
    }

    let clients = connect(&settings).await?;
    let account = clients
        .identity()
        .caller_identity()
        .await
        .context("Failed to get AWS account information")?;
    let target = resolve_target(&settings, &clients).await?;
    let distribution = clients
        .cdn()
        .get_distribution(&target.distribution_id)
        .await
        .context("Failed to get distribution")?;

    if as_json {
        let status = json!({
            "environment": settings.environment,
            "stack": settings.stack_name(),
            "account_id": account.account_id,
            "target": target,
            "distribution": {
                "id": distribution.id,
                "domain_name": distribution.domain_name,
                "status": distribution.status,
                "enabled": distribution.enabled,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("🌍 Environment: {}", settings.environment);
    println!("📦 Stack: {}", settings.stack_name());
    println!("👤 Account: {} ({})", account.account_id, account.user_arn);
    println!("🪣 Bucket: {}", target.bucket_name);
    println!("📡 Distribution: {} ({})", distribution.id, distribution.domain_name);
    if distribution.enabled {
        println!("   ✅ Status: {}", distribution.status);
    } else {
        println!("   ❌ Status: {} (disabled)", distribution.status);
    }
    println!("🔗 Website: {}", target.website_url);
    Ok(())
}

use anyhow::{Result, bail};
use frontdeploy_core::{Environment, Outcome};
use frontdeploy_deployer::DeploymentOrchestrator;

pub fn run(environment: Environment) -> Result<()> {
    match DeploymentOrchestrator::rollback(environment) {
        Outcome::Success(()) => {
            println!("✅ Rolled back {}", environment);
            Ok(())
        }
        Outcome::Failure { message, .. } => {
            println!("\n❌ Rollback failed");
            println!("Environment: {}", environment);
            bail!(message)
        }
    }
}

mod commands;
mod telemetry;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use frontdeploy_core::Environment;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "frontdeploy")]
#[command(version, about = "Deploy a static frontend to S3 and CloudFront", long_about = None)]
struct Cli {
    /// Frontend project directory (holds package.json and deploy/<env>.toml)
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Build the frontend and upload it to the environment's bucket
    Deploy {
        /// Target environment: dev, stage or prod
        environment: Environment,

        /// Upload the existing build output without rebuilding
        #[arg(long)]
        skip_build: bool,

        /// Maximum number of parallel uploads
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Upload the existing build output
    Upload {
        /// Target environment: dev, stage or prod
        environment: Environment,

        /// Maximum number of parallel uploads
        #[arg(long)]
        max_workers: Option<usize>,

        /// Check AWS credentials before uploading
        #[arg(long)]
        validate_aws: bool,

        /// List what would be uploaded without contacting AWS
        #[arg(long)]
        dry_run: bool,
    },

    /// Invalidate cached paths on the environment's distribution
    Invalidate {
        /// Target environment: dev, stage or prod
        environment: Environment,

        /// Paths to invalidate (default: everything)
        #[arg(long, num_args = 1..)]
        paths: Vec<String>,

        /// Wait for the invalidation to complete
        #[arg(long)]
        wait: bool,

        /// Check AWS credentials before invalidating
        #[arg(long)]
        validate_aws: bool,
    },

    /// Show the resources an environment deploys to
    Status {
        /// Target environment: dev, stage or prod
        environment: Environment,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore the previous deployment
    Rollback {
        /// Target environment: dev, stage or prod
        environment: Environment,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Command {
    fn environment(&self) -> Option<Environment> {
        match self {
            Command::Deploy { environment, .. }
            | Command::Upload { environment, .. }
            | Command::Invalidate { environment, .. }
            | Command::Status { environment, .. }
            | Command::Rollback { environment } => Some(*environment),
            Command::Completions { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(environment) = cli.command.environment() else {
        if let Command::Completions { shell } = cli.command {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "frontdeploy", &mut io::stdout());
        }
        return Ok(());
    };

    let settings = frontdeploy_core::load_settings(&cli.project_root, environment)
        .context("Failed to load deployment settings")?;
    telemetry::init_tracing(
        cli.json_logs,
        telemetry::level_for(cli.verbose, &settings.log_level),
    );

    let root = cli.project_root;
    match cli.command {
        Command::Deploy {
            skip_build,
            max_workers,
            ..
        } => commands::deploy::run(settings, root, skip_build, max_workers).await,
        Command::Upload {
            max_workers,
            validate_aws,
            dry_run,
            ..
        } => commands::upload::run(settings, root, max_workers, validate_aws, dry_run).await,
        Command::Invalidate {
            paths,
            wait,
            validate_aws,
            ..
        } => commands::invalidate::run(settings, paths, wait, validate_aws).await,
        Command::Status { json, .. } => commands::status::run(settings, json).await,
        Command::Rollback { environment } => commands::rollback::run(environment),
        Command::Completions { .. } => Ok(()),
    }
}

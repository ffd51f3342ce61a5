// Frontend build invocation (`npm run build:<env>`)

use async_trait::async_trait;
use frontdeploy_core::config::DEFAULT_BUILD_ENV_VAR;
use frontdeploy_core::{Environment, Error, Result};
use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Version string of the tool, failing when it is not installed
    async fn version(&self) -> Result<String>;

    /// Run the environment build inside `project_root`
    async fn build(&self, project_root: &Path, environment: Environment) -> Result<()>;
}

pub struct NpmBuild {
    program: String,
    timeout: Duration,
    env_var: String,
}

impl NpmBuild {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            env_var: DEFAULT_BUILD_ENV_VAR.to_string(),
        }
    }

    /// Name of the variable carrying the environment name into the build
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }
}

#[async_trait]
impl BuildTool for NpmBuild {
    async fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                if e.kind() == IoErrorKind::NotFound {
                    Error::Configuration(format!(
                        "{} not found. Please install Node.js and npm.",
                        self.program
                    ))
                } else {
                    Error::Configuration(format!("Failed to run {}: {}", self.program, e))
                }
            })?;

        if !output.status.success() {
            return Err(Error::Configuration(format!(
                "{} is not available",
                self.program
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn build(&self, project_root: &Path, environment: Environment) -> Result<()> {
        let script = format!("build:{}", environment);
        info!(program = %self.program, script = %script, "Building frontend");

        let mut command = Command::new(&self.program);
        command
            .arg("run")
            .arg(&script)
            .current_dir(project_root)
            .envs(load_env_files(project_root, environment))
            .env(&self.env_var, environment.as_str())
            .env("NODE_ENV", "production")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::Build(format!(
                    "Frontend build process timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Build(format!("Failed to run {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(%stdout, %stderr, "Frontend build failed");
            return Err(Error::Build(format!(
                "Frontend build process failed ({})",
                output.status
            )));
        }

        debug!(%stdout, "Build stdout");
        Ok(())
    }
}

/// Variables from `.env`, `.env.local` and `.env.<env>` in `project_root`.
///
/// Later files override earlier ones, so the environment-specific file wins.
/// Missing or unreadable files are skipped.
pub fn load_env_files(project_root: &Path, environment: Environment) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let names = [
        ".env".to_string(),
        ".env.local".to_string(),
        format!(".env.{}", environment),
    ];

    for name in names {
        let path = project_root.join(&name);
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(file = %path.display(), "Loading environment variables");
                vars.extend(parse_env(&content));
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Failed to load env file"),
        }
    }
    vars
}

/// Parse `KEY=VALUE` lines, ignoring blanks and `#` comments
fn parse_env(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

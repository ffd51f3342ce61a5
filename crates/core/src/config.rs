use crate::error::{Error, Result};
use crate::types::Environment;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory, relative to the project root, holding `<env>.toml` settings
pub const SETTINGS_DIR: &str = "deploy";

const DEFAULT_DIST_DIR: &str = "dist";
const DEFAULT_BUILD_TOOL: &str = "npm";
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;
/// Variable naming the target environment in the build's environment
pub const DEFAULT_BUILD_ENV_VAR: &str = "DEPLOY_ENV";
const DEFAULT_RETRY_BASE_DELAY_SECS: u64 = 2;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Raw TOML configuration structure
/// This matches the `deploy/<env>.toml` file structure exactly
#[derive(Debug, Deserialize)]
struct RawSettings {
    environment: String,
    aws: RawAws,
    project: RawProject,
    #[serde(default)]
    build: RawBuild,
    deployment: RawDeployment,
    #[serde(default)]
    monitoring: RawMonitoring,
}

#[derive(Debug, Deserialize)]
struct RawAws {
    region: String,
    profile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    name: String,
    stack_prefix: String,
    dist_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBuild {
    tool: Option<String>,
    timeout_secs: Option<u64>,
    env_var: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDeployment {
    upload_concurrency: usize,
    retry_attempts: u32,
    retry_base_delay_secs: Option<u64>,
    #[serde(default)]
    enable_cache_invalidation: bool,
}

#[derive(Debug, Deserialize)]
struct RawMonitoring {
    log_level: String,
}

impl Default for RawMonitoring {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Validated per-environment deployment settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSettings {
    pub environment: Environment,
    pub aws_region: String,
    pub aws_profile: Option<String>,
    pub project_name: String,
    pub stack_prefix: String,
    pub dist_dir: PathBuf,
    pub build_tool: String,
    pub build_timeout: Duration,
    pub build_env_var: String,
    pub upload_concurrency: usize,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub enable_cache_invalidation: bool,
    pub log_level: String,
}

impl EnvironmentSettings {
    /// CloudFormation stack holding the hosting resources for this environment
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.stack_prefix, self.environment)
    }
}

/// Path of the settings file for `environment` under `project_root`
pub fn settings_path(project_root: &Path, environment: Environment) -> PathBuf {
    project_root
        .join(SETTINGS_DIR)
        .join(format!("{}.toml", environment))
}

/// Load `deploy/<env>.toml` from the project root.
///
/// `AWS_REGION`, when set, takes precedence over the file's region.
pub fn load_settings(project_root: &Path, environment: Environment) -> Result<EnvironmentSettings> {
    let path = settings_path(project_root, environment);
    if !path.exists() {
        return Err(Error::Configuration(format!(
            "Environment config file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(&path)?;
    let region_override = std::env::var("AWS_REGION").ok();
    parse_settings_str(&content, environment, region_override.as_deref()).map_err(|e| match e {
        Error::Configuration(msg) => Error::Configuration(format!(
            "Invalid environment config file {}: {}",
            path.display(),
            msg
        )),
        other => other,
    })
}

/// Parse settings from a string (useful for testing)
pub fn parse_settings_str(
    content: &str,
    environment: Environment,
    region_override: Option<&str>,
) -> Result<EnvironmentSettings> {
    let raw: RawSettings = toml::from_str(content)?;

    let declared: Environment = raw.environment.parse()?;
    if declared != environment {
        return Err(Error::Configuration(format!(
            "file declares environment '{}' but '{}' was requested",
            declared, environment
        )));
    }

    if raw.deployment.upload_concurrency == 0 {
        return Err(Error::Configuration(
            "deployment.upload_concurrency must be at least 1".to_string(),
        ));
    }
    if raw.deployment.retry_attempts == 0 {
        return Err(Error::Configuration(
            "deployment.retry_attempts must be at least 1".to_string(),
        ));
    }

    let log_level = raw.monitoring.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&log_level.as_str()) {
        return Err(Error::Configuration(format!(
            "monitoring.log_level '{}' is not one of {}",
            raw.monitoring.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let dist_dir = validate_relative_dir(
        raw.project.dist_dir.as_deref().unwrap_or(DEFAULT_DIST_DIR),
        "project.dist_dir",
    )?;

    let build_env_var = raw
        .build
        .env_var
        .unwrap_or_else(|| DEFAULT_BUILD_ENV_VAR.to_string());
    if !is_env_var_name(&build_env_var) {
        return Err(Error::Configuration(format!(
            "build.env_var '{}' is not a valid environment variable name",
            build_env_var
        )));
    }

    let aws_region = region_override
        .filter(|r| !r.trim().is_empty())
        .map(str::to_string)
        .unwrap_or(raw.aws.region);

    Ok(EnvironmentSettings {
        environment,
        aws_region,
        aws_profile: raw.aws.profile,
        project_name: raw.project.name,
        stack_prefix: raw.project.stack_prefix,
        dist_dir,
        build_tool: raw
            .build
            .tool
            .unwrap_or_else(|| DEFAULT_BUILD_TOOL.to_string()),
        build_timeout: Duration::from_secs(
            raw.build.timeout_secs.unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS),
        ),
        build_env_var,
        upload_concurrency: raw.deployment.upload_concurrency,
        retry_attempts: raw.deployment.retry_attempts,
        retry_base_delay: Duration::from_secs(
            raw.deployment
                .retry_base_delay_secs
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_SECS),
        ),
        enable_cache_invalidation: raw.deployment.enable_cache_invalidation,
        log_level,
    })
}

/// Letters, digits and `_`, not starting with a digit
fn is_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Validate a directory setting relative to the project root.
///
/// Absolute paths and `..` components are rejected so a settings file
/// cannot point the uploader outside the project.
fn validate_relative_dir(path_str: &str, field_name: &str) -> Result<PathBuf> {
    if path_str.trim().is_empty() {
        return Err(Error::Configuration(format!(
            "Empty path in '{}' field",
            field_name
        )));
    }

    let path = Path::new(path_str);
    if path.is_absolute() {
        return Err(Error::Configuration(format!(
            "Absolute paths not allowed in '{}': '{}'. Use relative paths only.",
            field_name, path_str
        )));
    }

    if path
        .components()
        .any(|c| c == std::path::Component::ParentDir)
    {
        return Err(Error::Configuration(format!(
            "Parent directory references (..) not allowed in '{}': '{}'",
            field_name, path_str
        )));
    }

    Ok(path.to_path_buf())
}

// Project and build-output checks run before and after the frontend build

use frontdeploy_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File every build output must contain
pub const ENTRY_POINT: &str = "index.html";

/// Manifest that marks a directory as a buildable frontend project
pub const PROJECT_MANIFEST: &str = "package.json";

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse the report into an error when anything blocking was found
    pub fn into_result(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::Configuration(self.errors.join("; ")))
        }
    }
}

/// Check that `project_root` looks like a frontend project we can build.
pub fn validate_project(project_root: &Path, environment: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !project_root.is_dir() {
        report.errors.push(format!(
            "Project root does not exist: {}",
            project_root.display()
        ));
        return report;
    }

    let manifest = project_root.join(PROJECT_MANIFEST);
    if manifest.is_file() {
        report
            .info
            .push(format!("Found {}", manifest.display()));
    } else {
        report.errors.push(format!(
            "{} not found in {}",
            PROJECT_MANIFEST,
            project_root.display()
        ));
    }

    let env_file = project_root.join(format!(".env.{}", environment));
    if !env_file.is_file() {
        report.warnings.push(format!(
            "{} not found; the build will only see the process environment and shared .env files",
            env_file.display()
        ));
    }

    report
}

/// Statistics about a finished build output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub dist_dir: PathBuf,
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Verify a build produced a usable output directory and measure it.
pub fn validate_build_output(dist_dir: &Path) -> Result<BuildStats> {
    if !dist_dir.is_dir() {
        return Err(Error::Build(format!(
            "Build output directory not found: {}",
            dist_dir.display()
        )));
    }

    if !dist_dir.join(ENTRY_POINT).is_file() {
        return Err(Error::Build(format!(
            "{} not found in build output",
            ENTRY_POINT
        )));
    }

    let mut stats = BuildStats {
        dist_dir: dist_dir.to_path_buf(),
        total_files: 0,
        total_bytes: 0,
    };

    for entry in WalkDir::new(dist_dir).follow_links(true) {
        let entry =
            entry.map_err(|e| Error::Build(format!("Failed to scan build output: {}", e)))?;
        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|e| {
                Error::Build(format!("Failed to stat {}: {}", entry.path().display(), e))
            })?;
            stats.total_files += 1;
            stats.total_bytes += metadata.len();
        }
    }

    Ok(stats)
}

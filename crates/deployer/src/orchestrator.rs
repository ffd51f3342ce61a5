//! End-to-end deployment: prerequisites, frontend build, upload.
//!
//! Each step is timed and recorded in a [`DeploymentReport`]. The first failing
//! step ends the run; whatever the earlier steps produced stays in the report.

use crate::builder::BuildTool;
use crate::remote::{AccountInfo, CallerIdentity, ObjectStore, StackOutputs};
use crate::resolver::{ConfigResolver, RetryPolicy};
use crate::uploader::ParallelUploader;
use frontdeploy_core::{
    DeploymentTarget, Environment, EnvironmentSettings, Error, ErrorKind, Outcome, Result,
    UploadReport, format_megabytes,
};
use frontdeploy_validator::{BuildStats, validate_build_output, validate_project};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Prerequisites,
    Build,
    Upload,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStep::Prerequisites => "prerequisites",
            DeployStep::Build => "build",
            DeployStep::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Skipped,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: DeployStep,
    pub status: StepStatus,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub environment: Environment,
    pub steps: Vec<StepReport>,
    pub account: Option<AccountInfo>,
    pub target: Option<DeploymentTarget>,
    pub build: Option<BuildStats>,
    /// Present whenever the upload step ran, including a partial failure
    pub upload: Option<UploadReport>,
    pub total_duration: Duration,
}

impl DeploymentReport {
    fn new(environment: Environment) -> Self {
        Self {
            environment,
            steps: Vec::new(),
            account: None,
            target: None,
            build: None,
            upload: None,
            total_duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    /// The step that ended the run, if any
    pub fn failure(&self) -> Option<(&DeployStep, &ErrorKind, &str)> {
        self.steps.iter().find_map(|s| match &s.status {
            StepStatus::Failed { kind, message } => Some((&s.step, kind, message.as_str())),
            _ => None,
        })
    }

    fn record(&mut self, step: DeployStep, status: StepStatus, started: Instant) {
        self.steps.push(StepReport {
            step,
            status,
            duration: started.elapsed(),
        });
    }

    fn record_failure(
        &mut self,
        step: DeployStep,
        kind: ErrorKind,
        message: String,
        started: Instant,
    ) {
        self.record(step, StepStatus::Failed { kind, message }, started);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    pub skip_build: bool,
}

/// Remote and local collaborators the orchestrator drives
pub struct Collaborators {
    pub stacks: Arc<dyn StackOutputs>,
    pub store: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn CallerIdentity>,
    pub build_tool: Arc<dyn BuildTool>,
}

pub struct DeploymentOrchestrator {
    settings: EnvironmentSettings,
    project_root: PathBuf,
    identity: Arc<dyn CallerIdentity>,
    build_tool: Arc<dyn BuildTool>,
    resolver: ConfigResolver,
    uploader: ParallelUploader,
    span: Span,
}

impl DeploymentOrchestrator {
    pub fn new(
        settings: EnvironmentSettings,
        project_root: impl Into<PathBuf>,
        collaborators: Collaborators,
        span: Span,
    ) -> Self {
        let resolver = ConfigResolver::new(
            collaborators.stacks,
            RetryPolicy::from_settings(&settings),
            info_span!(parent: &span, "resolve"),
        );
        let uploader = ParallelUploader::new(
            collaborators.store,
            info_span!(parent: &span, "upload"),
        )
        .with_concurrency(settings.upload_concurrency);

        Self {
            settings,
            project_root: project_root.into(),
            identity: collaborators.identity,
            build_tool: collaborators.build_tool,
            resolver,
            uploader,
            span,
        }
    }

    /// Override the configured upload concurrency
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.uploader = self.uploader.with_concurrency(concurrency);
        self
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.project_root.join(&self.settings.dist_dir)
    }

    pub async fn deploy(&self, options: DeployOptions) -> DeploymentReport {
        let started = Instant::now();
        let environment = self.settings.environment;
        let mut report = DeploymentReport::new(environment);
        info!(parent: &self.span, %environment, "Starting frontend deployment");

        let step_started = Instant::now();
        let target = match self
            .check_prerequisites(options)
            .instrument(self.span.clone())
            .await
        {
            Ok((account, target)) => {
                report.account = Some(account);
                report.target = Some(target.clone());
                report.record(DeployStep::Prerequisites, StepStatus::Succeeded, step_started);
                target
            }
            Err(e) => {
                report.record_failure(
                    DeployStep::Prerequisites,
                    e.kind(),
                    e.to_string(),
                    step_started,
                );
                return self.finish(report, started);
            }
        };

        let step_started = Instant::now();
        if options.skip_build {
            info!(parent: &self.span, "Skipping frontend build");
            report.record(DeployStep::Build, StepStatus::Skipped, step_started);
        } else {
            match self.run_build().instrument(self.span.clone()).await {
                Ok(stats) => {
                    report.build = Some(stats);
                    report.record(DeployStep::Build, StepStatus::Succeeded, step_started);
                }
                Err(e) => {
                    report.record_failure(DeployStep::Build, e.kind(), e.to_string(), step_started);
                    return self.finish(report, started);
                }
            }
        }

        let step_started = Instant::now();
        match self.uploader.upload(&target, &self.dist_dir()).await {
            Outcome::Success(upload) => {
                report.upload = Some(upload);
                report.record(DeployStep::Upload, StepStatus::Succeeded, step_started);
            }
            Outcome::Failure {
                kind,
                message,
                partial,
            } => {
                report.upload = partial;
                report.record_failure(DeployStep::Upload, kind, message, step_started);
            }
        }

        self.finish(report, started)
    }

    async fn check_prerequisites(
        &self,
        options: DeployOptions,
    ) -> Result<(AccountInfo, DeploymentTarget)> {
        info!("Checking prerequisites");

        // A prebuilt dist directory needs neither the build tool nor the manifest
        if !options.skip_build {
            let version = self.build_tool.version().await?;
            info!(tool = %self.settings.build_tool, %version, "Build tool available");

            let project = validate_project(&self.project_root, self.settings.environment.as_str())
                .into_result()?;
            for warning in &project.warnings {
                warn!("{}", warning);
            }
        }

        let account = self.identity.caller_identity().await?;
        info!(account = %account.account_id, arn = %account.user_arn, "AWS credentials valid");

        let target = self.resolver.resolve(&self.settings).await?;
        Ok((account, target))
    }

    async fn run_build(&self) -> Result<BuildStats> {
        let dist = self.dist_dir();
        if dist.exists() {
            tokio::fs::remove_dir_all(&dist).await?;
            info!(dist = %dist.display(), "Cleaned existing dist directory");
        }

        let started = Instant::now();
        self.build_tool
            .build(&self.project_root, self.settings.environment)
            .await?;
        let stats = validate_build_output(&dist)?;

        info!(
            files = stats.total_files,
            size = %format_megabytes(stats.total_bytes),
            "Frontend build completed in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(stats)
    }

    fn finish(&self, mut report: DeploymentReport, started: Instant) -> DeploymentReport {
        report.total_duration = started.elapsed();
        match report.failure() {
            None => info!(
                parent: &self.span,
                "Deployment completed successfully in {:.1}s",
                report.total_duration.as_secs_f64()
            ),
            Some((step, kind, message)) => warn!(
                parent: &self.span,
                %step,
                %kind,
                "Deployment failed: {}",
                message
            ),
        }
        report
    }

    /// Restore a previous deployment. Not supported yet.
    pub fn rollback(environment: Environment) -> Outcome<()> {
        warn!(%environment, "Rollback requested but not implemented");
        Outcome::from_error(&Error::Unimplemented("Rollback".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{
        FakeBuild, FakeCdn, FakeIdentity, MemoryStore, ScriptedStacks, stack_outputs_for,
    };
    use crate::invalidator::CacheInvalidator;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn settings() -> EnvironmentSettings {
        EnvironmentSettings {
            environment: Environment::Dev,
            aws_region: "us-west-2".to_string(),
            aws_profile: None,
            project_name: "healthmate-frontend".to_string(),
            stack_prefix: "Healthmate-FrontendStack".to_string(),
            dist_dir: PathBuf::from("dist"),
            build_tool: "npm".to_string(),
            build_timeout: Duration::from_secs(600),
            build_env_var: "DEPLOY_ENV".to_string(),
            upload_concurrency: 5,
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(1),
            enable_cache_invalidation: false,
            log_level: "info".to_string(),
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{\"name\":\"app\"}").unwrap();
        dir
    }

    struct Harness {
        store: Arc<MemoryStore>,
        build: Arc<FakeBuild>,
        orchestrator: DeploymentOrchestrator,
    }

    fn harness(root: &Path, store: MemoryStore, build: FakeBuild, identity_valid: bool) -> Harness {
        let store = Arc::new(store);
        let build = Arc::new(build);
        let collaborators = Collaborators {
            stacks: Arc::new(ScriptedStacks::new(vec![Ok(stack_outputs_for(
                "healthmate-frontend-dev",
                "E2EXAMPLE",
            ))])),
            store: store.clone(),
            identity: Arc::new(FakeIdentity {
                valid: identity_valid,
            }),
            build_tool: build.clone(),
        };
        let orchestrator =
            DeploymentOrchestrator::new(settings(), root, collaborators, Span::none());
        Harness {
            store,
            build,
            orchestrator,
        }
    }

    fn spa_build() -> FakeBuild {
        FakeBuild::writing(&[
            ("index.html", "<!doctype html><div id=root></div>"),
            ("assets/app.js", "console.log('app')"),
        ])
    }

    #[tokio::test]
    async fn test_full_deploy_then_invalidate() {
        let dir = project();
        let h = harness(dir.path(), MemoryStore::default(), spa_build(), true);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        assert!(report.is_success(), "{:?}", report.failure());
        let statuses: Vec<_> = report.steps.iter().map(|s| s.status.clone()).collect();
        assert_eq!(statuses, vec![StepStatus::Succeeded; 3]);
        let upload = report.upload.as_ref().unwrap();
        assert_eq!(upload.total, 2);
        assert_eq!(upload.succeeded, 2);
        assert_eq!(report.build.as_ref().unwrap().total_files, 2);
        assert_eq!(
            h.store.keys(),
            vec!["assets/app.js".to_string(), "index.html".to_string()]
        );

        let cdn = Arc::new(FakeCdn::new(&["Completed"]));
        let invalidator = CacheInvalidator::new(cdn.clone(), "healthmate-frontend", Span::none());
        let target = report.target.as_ref().unwrap();
        let invalidation = invalidator.invalidate(target, None, false).await.unwrap();

        assert_eq!(invalidation.request.paths, vec!["/*".to_string()]);
        assert_eq!(cdn.submitted_paths(), vec![vec!["/*".to_string()]]);
    }

    #[tokio::test]
    async fn test_build_replaces_stale_output() {
        let dir = project();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/stale.js"), "old").unwrap();
        let h = harness(dir.path(), MemoryStore::default(), spa_build(), true);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        assert!(report.is_success());
        assert!(!h.store.keys().contains(&"stale.js".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_credentials_stop_before_build() {
        let dir = project();
        let h = harness(dir.path(), MemoryStore::default(), spa_build(), false);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        assert_eq!(report.steps.len(), 1);
        let (step, kind, _) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Prerequisites);
        assert_eq!(*kind, ErrorKind::Credential);
        assert_eq!(h.build.builds.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_prerequisites() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(dir.path(), MemoryStore::default(), spa_build(), true);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        let (step, kind, message) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Prerequisites);
        assert_eq!(*kind, ErrorKind::Configuration);
        assert!(message.contains("package.json"));
    }

    #[tokio::test]
    async fn test_missing_build_tool_fails_prerequisites() {
        let dir = project();
        let mut build = spa_build();
        build.installed = false;
        let h = harness(dir.path(), MemoryStore::default(), build, true);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        let (step, _, message) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Prerequisites);
        assert!(message.contains("npm not found"));
    }

    #[tokio::test]
    async fn test_build_failure_skips_upload() {
        let dir = project();
        let mut build = spa_build();
        build.exit_failure = true;
        let h = harness(dir.path(), MemoryStore::default(), build, true);

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        let (step, kind, _) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Build);
        assert_eq!(*kind, ErrorKind::Build);
        assert!(report.target.is_some());
        assert!(report.upload.is_none());
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_build_without_entry_point_fails() {
        let dir = project();
        let h = harness(
            dir.path(),
            MemoryStore::default(),
            FakeBuild::writing(&[("app.js", "x")]),
            true,
        );

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        let (step, _, message) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Build);
        assert!(message.contains("index.html"));
    }

    #[tokio::test]
    async fn test_skip_build_uploads_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/index.html"), "<html></html>").unwrap();
        let mut build = spa_build();
        build.installed = false;
        let h = harness(dir.path(), MemoryStore::default(), build, true);

        let report = h
            .orchestrator
            .deploy(DeployOptions { skip_build: true })
            .await;

        assert!(report.is_success(), "{:?}", report.failure());
        assert_eq!(report.steps[1].status, StepStatus::Skipped);
        assert!(report.build.is_none());
        assert_eq!(h.build.builds.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.keys(), vec!["index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_upload_keeps_report() {
        let dir = project();
        let h = harness(
            dir.path(),
            MemoryStore::failing(&["assets/app.js"]),
            spa_build(),
            true,
        );

        let report = h.orchestrator.deploy(DeployOptions::default()).await;

        let (step, kind, message) = report.failure().unwrap();
        assert_eq!(*step, DeployStep::Upload);
        assert_eq!(*kind, ErrorKind::PartialUpload);
        assert_eq!(message, "1 of 2 files failed to upload");
        let upload = report.upload.as_ref().unwrap();
        assert_eq!(upload.succeeded, 1);
        assert_eq!(upload.failed, 1);
    }

    #[test]
    fn test_rollback_is_unimplemented() {
        match DeploymentOrchestrator::rollback(Environment::Prod) {
            Outcome::Failure { kind, message, .. } => {
                assert_eq!(kind, ErrorKind::Unimplemented);
                assert_eq!(message, "Rollback is not implemented");
            }
            Outcome::Success(_) => panic!("rollback should not succeed"),
        }
    }

    #[test]
    fn test_concurrency_override() {
        let dir = project();
        let h = harness(dir.path(), MemoryStore::default(), spa_build(), true);
        let orchestrator = h.orchestrator.with_concurrency(12);
        assert_eq!(orchestrator.uploader.concurrency(), 12);
        assert_eq!(orchestrator.dist_dir(), dir.path().join("dist"));
    }
}

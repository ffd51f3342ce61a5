// In-memory stand-ins for the remote seams, shared by the unit tests

use crate::remote::{
    AccountInfo, CallerIdentity, CdnControl, DistributionInfo, InvalidationState,
    ObjectStore, PutObjectRequest, StackOutputs,
};
use crate::builder::BuildTool;
use async_trait::async_trait;
use frontdeploy_core::{Environment, Error, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn stack_outputs_for(bucket: &str, distribution: &str) -> Vec<(String, String)> {
    vec![
        ("BucketName".to_string(), bucket.to_string()),
        ("DistributionId".to_string(), distribution.to_string()),
        (
            "DistributionDomainName".to_string(),
            format!("{}.cloudfront.net", distribution.to_lowercase()),
        ),
        (
            "WebsiteUrl".to_string(),
            format!("https://{}.cloudfront.net", distribution.to_lowercase()),
        ),
    ]
}

/// Answers queued in order; once drained every call returns the last answer
pub struct ScriptedStacks {
    answers: Mutex<VecDeque<Result<Vec<(String, String)>>>>,
    pub calls: AtomicUsize,
}

impl ScriptedStacks {
    pub fn new(answers: Vec<Result<Vec<(String, String)>>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn clone_result(answer: &Result<Vec<(String, String)>>) -> Result<Vec<(String, String)>> {
    match answer {
        Ok(outputs) => Ok(outputs.clone()),
        Err(Error::TransientRemote(m)) => Err(Error::TransientRemote(m.clone())),
        Err(Error::Credential(m)) => Err(Error::Credential(m.clone())),
        Err(other) => Err(Error::PermanentRemote(other.to_string())),
    }
}

#[async_trait]
impl StackOutputs for ScriptedStacks {
    async fn describe_outputs(&self, _stack_name: &str) -> Result<Vec<(String, String)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            clone_result(answers.front().expect("at least one scripted answer"))
        }
    }
}

/// Bucket-backed store that can be told to reject specific keys
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<String, PutObjectRequest>>,
    pub failing_keys: HashSet<String>,
    pub panicking_keys: HashSet<String>,
    pub bucket_missing: bool,
    /// Error returned by `head_bucket` in place of the usual not-found
    pub bucket_error: Option<fn() -> Error>,
    pub puts: AtomicUsize,
}

impl MemoryStore {
    pub fn failing(keys: &[&str]) -> Self {
        Self {
            failing_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        if let Some(make_error) = self.bucket_error {
            return Err(make_error());
        }
        if self.bucket_missing {
            return Err(Error::PermanentRemote(format!(
                "HeadBucket: NotFound - {}",
                bucket
            )));
        }
        Ok(())
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.panicking_keys.contains(&request.key) {
            panic!("simulated worker crash for {}", request.key);
        }
        if self.failing_keys.contains(&request.key) {
            return Err(Error::PermanentRemote(
                "PutObject: AccessDenied - Access Denied".to_string(),
            ));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(request.key.clone(), request);
        Ok(())
    }
}

pub struct FakeCdn {
    pub enabled: bool,
    pub create_error: Option<fn() -> Error>,
    /// Statuses returned by successive `get_invalidation` calls; the last repeats
    pub statuses: Mutex<VecDeque<&'static str>>,
    pub submitted: Mutex<Vec<(Vec<String>, String)>>,
}

impl FakeCdn {
    pub fn new(statuses: &[&'static str]) -> Self {
        Self {
            enabled: true,
            create_error: None,
            statuses: Mutex::new(statuses.iter().copied().collect()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted_paths(&self) -> Vec<Vec<String>> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|(paths, _)| paths.clone())
            .collect()
    }
}

#[async_trait]
impl CdnControl for FakeCdn {
    async fn get_distribution(&self, distribution_id: &str) -> Result<DistributionInfo> {
        Ok(DistributionInfo {
            id: distribution_id.to_string(),
            domain_name: "d111111abcdef8.cloudfront.net".to_string(),
            status: "Deployed".to_string(),
            enabled: self.enabled,
        })
    }

    async fn create_invalidation(
        &self,
        _distribution_id: &str,
        paths: &[String],
        reference_id: &str,
    ) -> Result<InvalidationState> {
        if let Some(make_error) = self.create_error {
            return Err(make_error());
        }
        self.submitted
            .lock()
            .unwrap()
            .push((paths.to_vec(), reference_id.to_string()));
        Ok(InvalidationState {
            id: "I2J0I21PCUYOIK".to_string(),
            status: "InProgress".to_string(),
        })
    }

    async fn get_invalidation(
        &self,
        _distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationState> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().copied().unwrap_or("InProgress")
        };
        if status == "error" {
            return Err(Error::PermanentRemote(format!(
                "Invalidation not found: {}",
                invalidation_id
            )));
        }
        Ok(InvalidationState {
            id: invalidation_id.to_string(),
            status: status.to_string(),
        })
    }
}

pub struct FakeIdentity {
    pub valid: bool,
}

#[async_trait]
impl CallerIdentity for FakeIdentity {
    async fn caller_identity(&self) -> Result<AccountInfo> {
        if !self.valid {
            return Err(Error::Credential(
                "GetCallerIdentity: InvalidClientTokenId - bad token".to_string(),
            ));
        }
        Ok(AccountInfo {
            account_id: "123456789012".to_string(),
            user_arn: "arn:aws:iam::123456789012:user/deployer".to_string(),
            user_id: "AIDAEXAMPLE".to_string(),
        })
    }
}

/// Build tool that writes fixed files into `<project>/dist`
pub struct FakeBuild {
    pub installed: bool,
    pub exit_failure: bool,
    pub files: Vec<(&'static str, &'static str)>,
    pub builds: AtomicUsize,
}

impl FakeBuild {
    pub fn writing(files: &[(&'static str, &'static str)]) -> Self {
        Self {
            installed: true,
            exit_failure: false,
            files: files.to_vec(),
            builds: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BuildTool for FakeBuild {
    async fn version(&self) -> Result<String> {
        if !self.installed {
            return Err(Error::Configuration(
                "npm not found. Please install Node.js and npm.".to_string(),
            ));
        }
        Ok("10.2.4".to_string())
    }

    async fn build(&self, project_root: &Path, _environment: Environment) -> Result<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.exit_failure {
            return Err(Error::Build(
                "Frontend build process failed (exit status: 1)".to_string(),
            ));
        }
        let dist = project_root.join("dist");
        for (name, contents) in &self.files {
            let path = dist.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        Ok(())
    }
}

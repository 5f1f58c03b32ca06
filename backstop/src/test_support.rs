//! Test-only helpers: temp workspaces and scripted capabilities.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;
use walkdir::WalkDir;

use crate::io::backup::{FsTreeCopier, TreeCopier};
use crate::io::credentials::{Credential, CredentialSource};
use crate::io::remote::Completion;
use crate::io::workspace::StaticRoots;

/// Write `(relative path, contents)` pairs under `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(root).expect("create root");
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
    }
}

/// Every regular file under `root`, keyed by relative path.
pub fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|entry| entry.expect("walk entry"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("relative path")
                .to_path_buf();
            (relative, fs::read(entry.path()).expect("read file"))
        })
        .collect()
}

/// Copier that fails for roots whose folder is named `fail_name` and copies the rest.
#[derive(Debug, Clone)]
pub struct FailingCopier {
    pub fail_name: String,
}

impl FailingCopier {
    pub fn on(fail_name: &str) -> Self {
        Self {
            fail_name: fail_name.to_string(),
        }
    }
}

impl TreeCopier for FailingCopier {
    fn copy_tree(&self, source: &Path, target: &Path) -> Result<()> {
        if source.ends_with(&self.fail_name) {
            return Err(anyhow!("disk full"));
        }
        FsTreeCopier.copy_tree(source, target)
    }
}

/// A temp directory holding zero or more project folders and a backup root.
pub struct TestWorkspace {
    temp: TempDir,
    projects: Vec<PathBuf>,
}

impl TestWorkspace {
    /// No workspace folders open.
    pub fn empty() -> Self {
        Self {
            temp: tempfile::tempdir().expect("tempdir"),
            projects: Vec::new(),
        }
    }

    /// One project folder named `name` populated with `files`.
    pub fn with_project(name: &str, files: &[(&str, &str)]) -> Self {
        let mut workspace = Self::empty();
        workspace.add_project(name, files);
        workspace
    }

    pub fn add_project(&mut self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = self.temp.path().join(name);
        write_files(&path, files);
        self.projects.push(path.clone());
        path
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn projects(&self) -> &[PathBuf] {
        &self.projects
    }

    pub fn roots(&self) -> StaticRoots {
        StaticRoots::from_paths(self.projects.iter().cloned())
    }

    /// Backup root next to the projects; not created until the first backup.
    pub fn backup_root(&self) -> PathBuf {
        self.temp.path().join("backups")
    }
}

/// Credential source with a fixed answer.
#[derive(Debug, Clone)]
pub enum FixedCredentials {
    Present(String),
    Absent,
    Failing(String),
}

impl FixedCredentials {
    pub fn present(key: &str) -> Self {
        Self::Present(key.to_string())
    }

    pub fn absent() -> Self {
        Self::Absent
    }

    pub fn failing(error: &str) -> Self {
        Self::Failing(error.to_string())
    }
}

#[async_trait]
impl CredentialSource for FixedCredentials {
    async fn credential(&self) -> Result<Option<Credential>> {
        match self {
            Self::Present(key) => Ok(Some(Credential::new(key.clone()))),
            Self::Absent => Ok(None),
            Self::Failing(error) => Err(anyhow!("{error}")),
        }
    }
}

/// Completion that replays queued replies and records every prompt it saw.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompletion {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCompletion {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            prompts: Arc::default(),
        }
    }

    pub fn replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|reply| Ok(reply.to_string())))
    }

    pub fn failures<'a>(errors: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(errors.into_iter().map(|error| Err(error.to_string())))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, _credential: &Credential, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        let next = self.replies.lock().expect("replies lock").pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(anyhow!("{error}")),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}

/// Completion that blocks inside the call until the test releases it.
///
/// Lets a test observe the session while the remote call is in flight.
#[derive(Debug, Clone)]
pub struct GatedCompletion {
    reply: String,
    called: Arc<Notify>,
    gate: Arc<Notify>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl GatedCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            called: Arc::default(),
            gate: Arc::default(),
            prompts: Arc::default(),
        }
    }

    /// Resolves once `complete` has been entered.
    pub async fn wait_until_called(&self) {
        self.called.notified().await;
    }

    /// Let the pending `complete` call return.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl Completion for GatedCompletion {
    async fn complete(&self, _credential: &Credential, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.called.notify_one();
        self.gate.notified().await;
        Ok(self.reply.clone())
    }
}

//! Test-only fakes for the provisioner's external seams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::io::config::ProvisionConfig;
use crate::io::git::SourceFetcher;
use crate::io::http::HttpFetch;
use crate::io::process::{CommandFailed, CommandRequest, CommandRunner};

/// [`CommandRunner`] that records requests and answers from a script keyed by program.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    stdout: HashMap<String, Vec<u8>>,
    failures: HashMap<String, i32>,
    requests: RefCell<Vec<CommandRequest>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `program` with `stdout`.
    pub fn with_stdout(mut self, program: &str, stdout: &[u8]) -> Self {
        self.stdout.insert(program.to_string(), stdout.to_vec());
        self
    }

    /// Make `program` exit with `code`.
    pub fn failing(mut self, program: &str, code: i32) -> Self {
        self.failures.insert(program.to_string(), code);
        self
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.program.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, request: &CommandRequest) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(code) = self.failures.get(&request.program) {
            return Err(CommandFailed {
                program: request.program.clone(),
                args: request.args.clone(),
                code: Some(*code),
                timed_out: false,
                stderr: "scripted failure".to_string(),
            }
            .into());
        }
        Ok(self
            .stdout
            .get(&request.program)
            .cloned()
            .unwrap_or_default())
    }
}

/// [`HttpFetch`] answering from a fixed URL -> body table; unknown URLs are 404s.
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl HttpFetch for ScriptedHttp {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP status client error (404 Not Found) for url ({url})"))
    }
}

/// [`SourceFetcher`] that materializes fixture files instead of cloning.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    files: Vec<(PathBuf, String)>,
    fail: bool,
    fetched: RefCell<Vec<(String, String)>>,
}

impl FixtureFetcher {
    pub fn with_file(path: &Path, contents: &str) -> Self {
        Self {
            files: vec![(path.to_path_buf(), contents.to_string())],
            ..Self::default()
        }
    }

    /// An empty checkout (no manifest at all).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<(String, String)> {
        self.fetched.borrow().clone()
    }
}

impl SourceFetcher for FixtureFetcher {
    fn fetch(&self, url: &str, branch: &str, dest: &Path) -> Result<()> {
        self.fetched
            .borrow_mut()
            .push((url.to_string(), branch.to_string()));
        if self.fail {
            return Err(CommandFailed {
                program: "git".to_string(),
                args: vec!["clone".to_string()],
                code: Some(128),
                timed_out: false,
                stderr: format!("fatal: Remote branch {branch} not found"),
            }
            .into());
        }
        fs::create_dir_all(dest)?;
        for (path, contents) in &self.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, contents)?;
        }
        Ok(())
    }
}

/// A staging root plus a source tree laid out for the default config.
pub struct Sandbox {
    _temp: tempfile::TempDir,
    pub root: PathBuf,
    pub source: PathBuf,
    pub config: ProvisionConfig,
}

impl Sandbox {
    /// Source tree with man sources, one built page per listed name, and a lock file.
    pub fn new(pages: &[&str]) -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("root");
        let source = temp.path().join("src");
        fs::create_dir_all(&root)?;

        let mut config = ProvisionConfig::default();
        config.root = root.clone();
        config.kubectl.os = Some("linux".to_string());
        config.kubectl.arch = Some("amd64".to_string());

        fs::create_dir_all(source.join(&config.docs.source_dir))?;
        fs::write(source.join(&config.docs.source_dir).join("sat.8.rst"), "sat\n")?;
        fs::write(source.join(&config.docs.lock_file), "rst2man==0.1\n")?;
        let output = source.join(&config.docs.output_dir);
        fs::create_dir_all(&output)?;
        for page in pages {
            fs::write(output.join(page), format!(".TH {page}\n"))?;
        }

        Ok(Self {
            _temp: temp,
            root,
            source,
            config,
        })
    }
}

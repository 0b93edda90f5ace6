//! Git adapter for fetching the pinned version-source repository.
//!
//! Version lookup must be reproducible, so clones are always shallow,
//! single-branch checkouts of an explicitly named branch. Every git call goes
//! through a [`CommandRunner`], so the command timeout and exit-status mapping
//! apply to clones too.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use super::process::{CommandRequest, CommandRunner};

/// Fetches a repository at a pinned branch into a local directory.
pub trait SourceFetcher {
    fn fetch(&self, url: &str, branch: &str, dest: &Path) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git<'a, R> {
    workdir: PathBuf,
    command: &'a [String],
    runner: &'a R,
}

impl<'a, R: CommandRunner> Git<'a, R> {
    /// `command` is the git argv prefix, normally `["git"]`.
    pub fn new(workdir: impl Into<PathBuf>, command: &'a [String], runner: &'a R) -> Self {
        Self {
            workdir: workdir.into(),
            command,
            runner,
        }
    }

    /// Shallow-clone `branch` of `url` into `dest` (relative to the workdir).
    #[instrument(skip_all, fields(url, branch))]
    pub fn clone_branch(&self, url: &str, branch: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        info!(url, branch, dest = %dest, "cloning pinned branch");
        self.run(&[
            "clone",
            "--quiet",
            "--depth",
            "1",
            "--single-branch",
            "--branch",
            branch,
            url,
            &dest,
        ])?;
        Ok(())
    }

    /// Return the current HEAD short SHA (stable given repo state).
    pub fn head_short_sha(&self, len: usize) -> Result<String> {
        let arg = format!("--short={len}");
        let out = self.run(&["rev-parse", &arg, "HEAD"])?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let request = CommandRequest::from_argv(self.command)?
            .args(args.iter().copied())
            .current_dir(&self.workdir);
        self.runner
            .run(&request)
            .with_context(|| format!("git {}", args[0]))
    }
}

/// [`SourceFetcher`] that runs `git clone` through a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct GitFetcher<'a, R> {
    runner: &'a R,
    command: Vec<String>,
}

impl<'a, R: CommandRunner> GitFetcher<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            command: vec!["git".to_string()],
        }
    }

    /// Use a different git argv prefix (e.g. a wrapper script).
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

impl<R: CommandRunner> SourceFetcher for GitFetcher<'_, R> {
    fn fetch(&self, url: &str, branch: &str, dest: &Path) -> Result<()> {
        let parent = dest
            .parent()
            .ok_or_else(|| anyhow!("clone destination has no parent: {}", dest.display()))?;
        Git::new(parent, &self.command, self.runner).clone_branch(url, branch, dest)?;
        if let Ok(sha) = Git::new(dest, &self.command, self.runner).head_short_sha(12) {
            debug!(sha = %sha, "cloned revision");
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use std::time::Duration;

    use crate::exit_codes;
    use crate::io::process::{CommandFailed, SystemCommandRunner};

    fn runner() -> SystemCommandRunner {
        SystemCommandRunner::new(Duration::from_secs(30), 1024 * 1024)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    }

    fn upstream_with_branch(dir: &Path, branch: &str, manifest: &str) {
        git(dir, &["init", "--quiet"]);
        git(dir, &["config", "user.email", "build@example.invalid"]);
        git(dir, &["config", "user.name", "build"]);
        git(dir, &["checkout", "--quiet", "-b", branch]);
        fs::write(dir.join("base.packages"), manifest).expect("write manifest");
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "--quiet", "-m", "pin packages"]);
    }

    fn command_failure(err: &anyhow::Error) -> &CommandFailed {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<CommandFailed>())
            .expect("typed failure")
    }

    /// git stand-in: `sh <script>` so the script never has to be executable.
    fn fake_git(dir: &Path, body: &str) -> Vec<String> {
        let script = dir.join("fake-git.sh");
        fs::write(&script, body).expect("write fake git");
        vec!["sh".to_string(), script.to_string_lossy().into_owned()]
    }

    #[test]
    fn clones_pinned_branch() {
        let upstream = tempfile::tempdir().expect("tempdir");
        upstream_with_branch(upstream.path(), "release/1.0", "kubectl=1.2.3-0\n");

        let work = tempfile::tempdir().expect("tempdir");
        let dest = work.path().join("checkout");
        let url = upstream.path().to_string_lossy().to_string();
        let runner = runner();
        GitFetcher::new(&runner)
            .fetch(&format!("file://{url}"), "release/1.0", &dest)
            .expect("fetch");

        let manifest = fs::read_to_string(dest.join("base.packages")).expect("read");
        assert_eq!(manifest, "kubectl=1.2.3-0\n");
        let command = vec!["git".to_string()];
        let sha = Git::new(&dest, &command, &runner)
            .head_short_sha(7)
            .expect("sha");
        assert_eq!(sha.len(), 7);
    }

    #[test]
    fn missing_branch_is_a_command_failure() {
        let upstream = tempfile::tempdir().expect("tempdir");
        upstream_with_branch(upstream.path(), "main", "");

        let work = tempfile::tempdir().expect("tempdir");
        let url = upstream.path().to_string_lossy().to_string();
        let runner = runner();
        let err = GitFetcher::new(&runner)
            .fetch(&format!("file://{url}"), "release/9.9", &work.path().join("c"))
            .unwrap_err();
        let failed = command_failure(&err);
        assert_eq!(failed.program, "git");
        assert_ne!(failed.code, Some(0));
    }

    #[test]
    fn clone_killed_by_signal_maps_to_128_plus_signal() {
        let work = tempfile::tempdir().expect("tempdir");
        let command = fake_git(work.path(), "kill -9 $$\n");
        let runner = runner();

        let err = GitFetcher::new(&runner)
            .with_command(command)
            .fetch("https://example.invalid/repo.git", "main", &work.path().join("c"))
            .unwrap_err();

        assert_eq!(command_failure(&err).code, Some(137));
        assert_eq!(exit_codes::for_error(&err), 137);
    }

    #[test]
    fn hanging_clone_times_out() {
        let work = tempfile::tempdir().expect("tempdir");
        let command = fake_git(work.path(), "exec sleep 30\n");
        let runner = SystemCommandRunner::new(Duration::from_millis(300), 1024);

        let err = GitFetcher::new(&runner)
            .with_command(command)
            .fetch("https://example.invalid/repo.git", "main", &work.path().join("c"))
            .unwrap_err();

        let failed = command_failure(&err);
        assert!(failed.timed_out);
        assert_ne!(exit_codes::for_error(&err), exit_codes::OK);
    }
}

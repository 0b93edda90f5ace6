//! Provisioner configuration stored as TOML (default `provisioner.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::url::DEFAULT_DOWNLOAD_URL;

pub const DEFAULT_CONFIG_PATH: &str = "provisioner.toml";

/// Provisioner configuration (TOML).
///
/// Every field has a default matching a standard image build, so an empty or
/// missing file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Directory under which all absolute target paths are resolved.
    pub root: PathBuf,

    /// Name of the packaged CLI. Log, completion and profile settings left
    /// unset are derived from it.
    pub cli_name: String,

    /// Wall-clock limit for each external command, in seconds.
    pub command_timeout_secs: u64,

    /// Keep at most this many bytes of each command's stdout/stderr.
    pub output_limit_bytes: usize,

    /// Timeout for each HTTP request, in seconds.
    pub http_timeout_secs: u64,

    pub logs: LogsConfig,
    pub docs: DocsConfig,
    pub completion: CompletionConfig,
    pub profile: ProfileConfig,
    pub kubectl: KubectlConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogsConfig {
    /// Defaults to `/var/log/<cli_name>`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocsConfig {
    /// Man page sources, relative to the source tree.
    pub source_dir: PathBuf,
    /// Where the build command leaves generated pages, relative to the source tree.
    pub output_dir: PathBuf,
    /// Dependency lock file for the doc generator, relative to the source tree.
    pub lock_file: PathBuf,
    /// Installs the doc generator; the lock file path is appended.
    pub install_command: Vec<String>,
    /// Builds the pages; runs inside `source_dir`.
    pub build_command: Vec<String>,
    /// Removes the doc generator; the lock file path is appended.
    pub remove_command: Vec<String>,
    /// System man directory; pages land in `man<section>/` below it.
    pub man_root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompletionConfig {
    /// Command whose stdout is the completion script.
    /// Defaults to `register-python-argcomplete <cli_name>`.
    pub generator: Option<Vec<String>>,
    /// Defaults to `/etc/bash_completion.d/<cli_name>-completion.bash`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Defaults to `/etc/profile.d/<cli_name>-path.sh`.
    pub path: Option<PathBuf>,
    /// Directory prepended to `PATH` by the profile script.
    /// Defaults to `/<cli_name>/venv/bin`.
    pub path_entry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubectlConfig {
    /// Repository holding the companion image's package manifest.
    pub repo_url: String,
    /// Pinned branch checked out for a reproducible lookup.
    pub branch: String,
    /// Manifest path inside the cloned repository.
    pub manifest_path: PathBuf,
    /// Package key whose value carries the version (`kubectl=1.2.3-0`).
    pub key: String,
    /// Plaintext "latest stable" marker used when the manifest has no version.
    pub stable_url: String,
    /// minijinja template; see `core::url::render_download_url`.
    pub download_url: String,
    pub install_path: PathBuf,
    /// Override the detected operating system.
    pub os: Option<String>,
    /// Override the detected architecture.
    pub arch: Option<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("docs/man"),
            output_dir: PathBuf::from("docs/man/_build/man"),
            lock_file: PathBuf::from("requirements-docs.lock.txt"),
            install_command: strings(&["pip3", "install", "--no-cache-dir", "-r"]),
            build_command: strings(&["make"]),
            remove_command: strings(&["pip3", "uninstall", "-y", "-r"]),
            man_root: PathBuf::from("/usr/share/man"),
        }
    }
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/Cray-HPE/csm-rpms.git".to_string(),
            branch: "release/1.0".to_string(),
            manifest_path: PathBuf::from("packages/node-image-non-compute-common/base.packages"),
            key: "kubectl".to_string(),
            stable_url: "https://dl.k8s.io/release/stable.txt".to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            install_path: PathBuf::from("/usr/bin/kubectl"),
            os: None,
            arch: None,
        }
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            cli_name: "sat".to_string(),
            command_timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            http_timeout_secs: 5 * 60,
            logs: LogsConfig::default(),
            docs: DocsConfig::default(),
            completion: CompletionConfig::default(),
            profile: ProfileConfig::default(),
            kubectl: KubectlConfig::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.logs
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/var/log/{}", self.cli_name)))
    }

    pub fn completion_generator(&self) -> Vec<String> {
        self.completion.generator.clone().unwrap_or_else(|| {
            vec![
                "register-python-argcomplete".to_string(),
                self.cli_name.clone(),
            ]
        })
    }

    pub fn completion_path(&self) -> PathBuf {
        self.completion.path.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "/etc/bash_completion.d/{}-completion.bash",
                self.cli_name
            ))
        })
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profile
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/etc/profile.d/{}-path.sh", self.cli_name)))
    }

    pub fn path_entry(&self) -> String {
        self.profile
            .path_entry
            .clone()
            .unwrap_or_else(|| format!("/{}/venv/bin", self.cli_name))
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.cli_name.trim().is_empty() {
            return Err(anyhow!("cli_name must not be empty"));
        }
        if self.cli_name.contains(['/', ' ', '\t', '\n']) {
            return Err(anyhow!(
                "cli_name must be a bare command name, got {:?}",
                self.cli_name
            ));
        }
        require_command("docs.install_command", &self.docs.install_command)?;
        require_command("docs.build_command", &self.docs.build_command)?;
        require_command("docs.remove_command", &self.docs.remove_command)?;
        require_command("completion.generator", &self.completion_generator())?;
        require_absolute("logs.dir", &self.log_dir())?;
        require_absolute("docs.man_root", &self.docs.man_root)?;
        require_absolute("completion.path", &self.completion_path())?;
        require_absolute("profile.path", &self.profile_path())?;
        require_absolute("kubectl.install_path", &self.kubectl.install_path)?;
        if self.path_entry().trim().is_empty() {
            return Err(anyhow!("profile.path_entry must not be empty"));
        }
        if self.kubectl.key.trim().is_empty() {
            return Err(anyhow!("kubectl.key must not be empty"));
        }
        if self.kubectl.branch.trim().is_empty() {
            return Err(anyhow!("kubectl.branch must be pinned"));
        }
        if self.kubectl.manifest_path.is_absolute() {
            return Err(anyhow!(
                "kubectl.manifest_path must be relative to the cloned repository"
            ));
        }
        Ok(())
    }
}

fn require_command(name: &str, command: &[String]) -> Result<()> {
    if command.is_empty() || command[0].trim().is_empty() {
        return Err(anyhow!("{name} must be a non-empty array"));
    }
    Ok(())
}

fn require_absolute(name: &str, path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(anyhow!("{name} must be an absolute path, got {}", path.display()));
    }
    Ok(())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ProvisionConfig::default()`.
pub fn load_config(path: &Path) -> Result<ProvisionConfig> {
    if !path.exists() {
        let cfg = ProvisionConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProvisionConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ProvisionConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ProvisionConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("provisioner.toml");
        let mut cfg = ProvisionConfig::default();
        cfg.kubectl.arch = Some("arm64".to_string());
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("provisioner.toml");
        fs::write(&path, "[kubectl]\nbranch = \"release/1.4\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.kubectl.branch, "release/1.4");
        assert_eq!(cfg.kubectl.key, "kubectl");
        assert_eq!(cfg.docs, DocsConfig::default());
    }

    #[test]
    fn rejects_relative_target_paths() {
        let mut cfg = ProvisionConfig::default();
        cfg.completion.path = Some(PathBuf::from("etc/completion.bash"));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("completion.path"));
    }

    #[test]
    fn unset_shell_settings_follow_cli_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("provisioner.toml");
        fs::write(&path, "cli_name = \"foo\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.log_dir(), PathBuf::from("/var/log/foo"));
        assert_eq!(
            cfg.completion_generator(),
            vec!["register-python-argcomplete", "foo"]
        );
        assert_eq!(
            cfg.completion_path(),
            PathBuf::from("/etc/bash_completion.d/foo-completion.bash")
        );
        assert_eq!(cfg.profile_path(), PathBuf::from("/etc/profile.d/foo-path.sh"));
        assert_eq!(cfg.path_entry(), "/foo/venv/bin");
    }

    #[test]
    fn explicit_shell_settings_override_cli_name() {
        let mut cfg = ProvisionConfig::default();
        cfg.cli_name = "foo".to_string();
        cfg.completion.path = Some(PathBuf::from("/usr/share/bash-completion/completions/foo"));
        cfg.profile.path_entry = Some("/opt/foo/bin".to_string());
        assert_eq!(
            cfg.completion_path(),
            PathBuf::from("/usr/share/bash-completion/completions/foo")
        );
        assert_eq!(cfg.path_entry(), "/opt/foo/bin");
        assert_eq!(cfg.log_dir(), PathBuf::from("/var/log/foo"));
    }

    #[test]
    fn rejects_cli_name_with_path_separator() {
        let mut cfg = ProvisionConfig::default();
        cfg.cli_name = "../sat".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_generator() {
        let mut cfg = ProvisionConfig::default();
        cfg.completion.generator = Some(Vec::new());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("completion.generator"));
    }
}

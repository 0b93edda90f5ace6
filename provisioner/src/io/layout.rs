//! Canonical target and source paths for one provisioning run.

use std::path::{Component, Path, PathBuf};

use super::config::ProvisionConfig;

/// All paths the procedure reads or writes, resolved against the install root
/// (targets) and the source tree (inputs).
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub source: PathBuf,
    pub log_dir: PathBuf,
    pub man_source_dir: PathBuf,
    pub man_output_dir: PathBuf,
    pub lock_file: PathBuf,
    pub man_root: PathBuf,
    pub completion_path: PathBuf,
    pub profile_path: PathBuf,
    pub kubectl_path: PathBuf,
}

impl Layout {
    pub fn new(cfg: &ProvisionConfig, source: impl Into<PathBuf>) -> Self {
        let root = cfg.root.clone();
        let source = source.into();
        Self {
            log_dir: under_root(&root, &cfg.log_dir()),
            man_source_dir: source.join(&cfg.docs.source_dir),
            man_output_dir: source.join(&cfg.docs.output_dir),
            lock_file: source.join(&cfg.docs.lock_file),
            man_root: under_root(&root, &cfg.docs.man_root),
            completion_path: under_root(&root, &cfg.completion_path()),
            profile_path: under_root(&root, &cfg.profile_path()),
            kubectl_path: under_root(&root, &cfg.kubectl.install_path),
            root,
            source,
        }
    }
}

/// Re-anchor an absolute target path below `root` (`/usr/bin` -> `<root>/usr/bin`).
pub fn under_root(root: &Path, target: &Path) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in target.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if out.as_path() != root {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

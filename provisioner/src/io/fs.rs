//! Filesystem helpers that enforce the install permissions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Mode for every directory the provisioner creates and for installed binaries.
pub const DIR_MODE: u32 = 0o755;
pub const EXEC_MODE: u32 = 0o755;
pub const FILE_MODE: u32 = 0o644;

/// Create `path` and any missing parents, giving each created directory mode 755.
///
/// Directories that already exist keep their mode. Returns the directories
/// that were created, outermost first.
pub fn ensure_dir(path: &Path) -> Result<Vec<PathBuf>> {
    if path.exists() && !path.is_dir() {
        return Err(anyhow!("{} exists but is not a directory", path.display()));
    }
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();

    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))?;
    for dir in &missing {
        set_mode(dir, DIR_MODE)?;
    }
    if !missing.is_empty() {
        debug!(path = %path.display(), created = missing.len(), "created directories");
    }
    Ok(missing)
}

/// Like [`ensure_dir`] but also forces mode 755 on `path` itself when it already existed.
pub fn ensure_dir_with_mode(path: &Path) -> Result<()> {
    ensure_dir(path)?;
    set_mode(path, DIR_MODE)
}

/// Write `contents` to `path` (mode 644), creating parent directories.
pub fn install_contents(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    set_mode(path, FILE_MODE)
}

/// Copy `src` to `dest` (mode 644), creating parent directories.
pub fn install_file(src: &Path, dest: &Path) -> Result<()> {
    ensure_parent(dest)?;
    fs::copy(src, dest)
        .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
    set_mode(dest, FILE_MODE)
}

/// Mark `src` executable and move it to `dest`.
///
/// Falls back to copy + remove when `src` and `dest` are on different filesystems.
pub fn install_executable(src: &Path, dest: &Path) -> Result<()> {
    set_mode(src, EXEC_MODE)?;
    ensure_parent(dest)?;
    if fs::rename(src, dest).is_err() {
        debug!(src = %src.display(), dest = %dest.display(), "rename failed, copying");
        fs::copy(src, dest)
            .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
        fs::remove_file(src).with_context(|| format!("remove {}", src.display()))?;
        set_mode(dest, EXEC_MODE)?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).map(|_| ()),
        _ => Ok(()),
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:o} {}", mode, path.display()))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
pub fn mode_of(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    Ok(meta.permissions().mode() & 0o7777)
}

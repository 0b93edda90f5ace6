//! Resolve the pinned `kubectl` version and install the matching binary.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::config::KubectlConfig;
use super::fs::install_executable;
use super::git::SourceFetcher;
use super::http::HttpFetch;
use crate::core::platform::Platform;
use crate::core::url::render_download_url;
use crate::core::version::{KubectlVersion, VersionSource, extract_from_manifest};

/// A version together with where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub version: KubectlVersion,
    pub source: VersionSource,
}

/// Clone the version-source repository at its pinned branch and resolve the
/// version from its manifest, falling back to the stable endpoint.
///
/// A failed clone is fatal; a missing manifest or a manifest without a
/// matching line triggers the fallback.
#[instrument(skip_all, fields(repo = %cfg.repo_url, branch = %cfg.branch))]
pub fn resolve_version<F: SourceFetcher, H: HttpFetch>(
    fetcher: &F,
    http: &H,
    cfg: &KubectlConfig,
) -> Result<ResolvedVersion> {
    let checkout = tempfile::Builder::new()
        .prefix("kubectl-version-")
        .tempdir()
        .context("create checkout directory")?;
    let repo_dir = checkout.path().join("repo");
    fetcher
        .fetch(&cfg.repo_url, &cfg.branch, &repo_dir)
        .with_context(|| format!("clone {} at {}", cfg.repo_url, cfg.branch))?;
    let manifest = repo_dir.join(&cfg.manifest_path);
    resolve_from_manifest(&manifest, http, cfg)
}

/// Resolve from a local manifest file, falling back to the stable endpoint.
pub fn resolve_from_manifest<H: HttpFetch>(
    manifest: &Path,
    http: &H,
    cfg: &KubectlConfig,
) -> Result<ResolvedVersion> {
    if let Some(version) = version_from_manifest_file(manifest, &cfg.key)? {
        info!(%version, manifest = %manifest.display(), "version pinned by manifest");
        return Ok(ResolvedVersion {
            version,
            source: VersionSource::Manifest,
        });
    }
    warn!(
        manifest = %manifest.display(),
        key = %cfg.key,
        "no pinned version in manifest, using stable endpoint"
    );
    let version = fetch_stable_version(http, &cfg.stable_url)?;
    info!(%version, "version from stable endpoint");
    Ok(ResolvedVersion {
        version,
        source: VersionSource::StableEndpoint,
    })
}

/// Read `path` and extract the version for `key`; a missing file yields `None`.
pub fn version_from_manifest_file(path: &Path, key: &str) -> Result<Option<KubectlVersion>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(extract_from_manifest(&contents, key)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(manifest = %path.display(), "manifest not found");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("read manifest {}", path.display())),
    }
}

/// Fetch and parse the plaintext "latest stable" marker (`v1.29.3`).
pub fn fetch_stable_version<H: HttpFetch>(http: &H, url: &str) -> Result<KubectlVersion> {
    let body = http.get(url).context("fetch stable kubectl version")?;
    let text = String::from_utf8_lossy(&body);
    KubectlVersion::parse(&text).with_context(|| format!("parse stable version from {url}"))
}

/// Download `kubectl` for `version`, mark it executable and move it into place.
#[instrument(skip_all, fields(%version, os = %platform.os, arch = %platform.arch))]
pub fn install_kubectl<H: HttpFetch>(
    http: &H,
    cfg: &KubectlConfig,
    version: &KubectlVersion,
    platform: &Platform,
    dest: &Path,
) -> Result<PathBuf> {
    let url = render_download_url(&cfg.download_url, version, platform)?;
    info!(url = %url, "downloading kubectl");
    let body = http.get(&url).context("download kubectl")?;
    if body.is_empty() {
        return Err(anyhow!("empty kubectl download from {url}"));
    }

    let staging = tempfile::Builder::new()
        .prefix("kubectl-download-")
        .tempdir()
        .context("create download directory")?;
    let downloaded = staging.path().join("kubectl");
    fs::write(&downloaded, &body)
        .with_context(|| format!("write {}", downloaded.display()))?;
    install_executable(&downloaded, dest)?;
    info!(path = %dest.display(), bytes = body.len(), "installed kubectl");
    Ok(dest.to_path_buf())
}

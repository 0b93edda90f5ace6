//! `kubectl` version parsing and manifest extraction.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

static SEMVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)$").expect("semver regex is valid"));

/// A `major.minor.patch` Kubernetes client version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubectlVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KubectlVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `1.2.3` or `v1.2.3`, ignoring surrounding whitespace.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let caps = SEMVER_RE
            .captures(trimmed)
            .ok_or_else(|| anyhow!("not a kubectl version: '{trimmed}'"))?;
        let part = |idx: usize| -> Result<u32> {
            caps[idx]
                .parse()
                .map_err(|e| anyhow!("version component '{}' out of range: {e}", &caps[idx]))
        };
        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }

    /// Release tag form used by the upstream download layout (`v1.2.3`).
    pub fn tag(&self) -> String {
        format!("v{self}")
    }
}

impl fmt::Display for KubectlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for KubectlVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for KubectlVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KubectlVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Extracted from the companion image's package manifest.
    Manifest,
    /// Fetched from the public "latest stable" marker.
    StableEndpoint,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Manifest => "manifest",
            VersionSource::StableEndpoint => "stable endpoint",
        }
    }
}

/// Extract the pinned version for `key` from a package manifest.
///
/// The first line containing `<key>=` wins. Its value is a
/// `version-release` string such as `1.19.9-0`; only the leading
/// `major.minor.patch` is kept. Returns `None` when no line matches.
pub fn extract_from_manifest(contents: &str, key: &str) -> Option<KubectlVersion> {
    let needle = format!("{key}=");
    let line = contents.lines().find(|line| line.contains(&needle))?;
    let pattern = format!(r"{}=v?(\d+\.\d+\.\d+)", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(line)?;
    KubectlVersion::parse(&caps[1]).ok()
}

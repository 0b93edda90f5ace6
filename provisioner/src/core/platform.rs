//! Host platform naming as used by Kubernetes release artifacts.

use anyhow::{Result, anyhow};
use serde::Serialize;

/// `os`/`arch` pair in Kubernetes release naming (`linux`/`amd64`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Platform of the running host.
    pub fn detect() -> Result<Self> {
        Self::from_rust_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names to Kubernetes release names.
    pub fn from_rust_target(os: &str, arch: &str) -> Result<Self> {
        let os = match os {
            "linux" | "darwin" | "windows" => os,
            "macos" => "darwin",
            other => return Err(anyhow!("unsupported operating system '{other}'")),
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "arm" => "arm",
            "powerpc64" => "ppc64le",
            "s390x" => "s390x",
            "x86" => "386",
            other => return Err(anyhow!("unsupported architecture '{other}'")),
        };
        Ok(Self::new(os, arch))
    }

    /// Detected platform with optional per-field overrides from config.
    pub fn resolve(os: Option<&str>, arch: Option<&str>) -> Result<Self> {
        match (os, arch) {
            (Some(os), Some(arch)) => Ok(Self::new(os, arch)),
            _ => {
                let detected = Self::detect()?;
                Ok(Self::new(
                    os.unwrap_or(detected.os.as_str()),
                    arch.unwrap_or(detected.arch.as_str()),
                ))
            }
        }
    }
}

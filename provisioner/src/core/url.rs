//! Download URL rendering for the `kubectl` binary.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};

use super::platform::Platform;
use super::version::KubectlVersion;

pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://dl.k8s.io/release/{{ tag }}/bin/{{ os }}/{{ arch }}/kubectl";

/// Render a download URL template.
///
/// Available variables: `version` (`1.2.3`), `tag` (`v1.2.3`), `os`, `arch`.
/// Unknown variables are an error rather than rendering empty.
pub fn render_download_url(
    template: &str,
    version: &KubectlVersion,
    platform: &Platform,
) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("download_url", template)
        .context("parse download url template")?;
    let rendered = env
        .get_template("download_url")?
        .render(context! {
            version => version.to_string(),
            tag => version.tag(),
            os => &platform.os,
            arch => &platform.arch,
        })
        .context("render download url template")?;
    Ok(rendered.trim().to_string())
}

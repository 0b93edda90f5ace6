//! Shell integration for the packaged CLI: completion script and `PATH` profile.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use super::fs::install_contents;
use super::layout::Layout;
use super::process::{CommandRequest, CommandRunner};

/// Run the completion generator and install its output.
#[instrument(skip_all, fields(path = %layout.completion_path.display()))]
pub fn install_completion<R: CommandRunner>(
    runner: &R,
    layout: &Layout,
    generator: &[String],
) -> Result<PathBuf> {
    let request = CommandRequest::from_argv(generator)?;
    let script = runner
        .run(&request)
        .context("generate completion script")?;
    if script.iter().all(u8::is_ascii_whitespace) {
        return Err(anyhow!("{request} produced an empty completion script"));
    }
    install_contents(&layout.completion_path, &script)?;
    info!(bytes = script.len(), "installed completion script");
    Ok(layout.completion_path.clone())
}

/// Write the login profile script that prepends `path_entry` to `PATH`.
#[instrument(skip_all, fields(path = %layout.profile_path.display()))]
pub fn write_profile_script(layout: &Layout, path_entry: &str) -> Result<PathBuf> {
    let script = render_profile_script(path_entry)?;
    install_contents(&layout.profile_path, script.as_bytes())?;
    info!(entry = %path_entry, "installed profile script");
    Ok(layout.profile_path.clone())
}

fn render_profile_script(entry: &str) -> Result<String> {
    if entry.contains(['"', '$', '`', '\\', '\n']) {
        return Err(anyhow!("PATH entry contains shell metacharacters: {entry:?}"));
    }
    Ok(format!("export PATH=\"{entry}:$PATH\"\n"))
}

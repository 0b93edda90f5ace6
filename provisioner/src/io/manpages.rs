//! Build and install the packaged CLI's manual pages.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use super::config::DocsConfig;
use super::fs::{ensure_dir, install_file};
use super::layout::Layout;
use super::process::{CommandRequest, CommandRunner};

/// Install the doc generator from the lock file, build the pages, then remove
/// the generator again.
///
/// The generator is only removed when the build succeeds; any failure stops
/// the procedure where it is.
#[instrument(skip_all, fields(source = %layout.man_source_dir.display()))]
pub fn build_man_pages<R: CommandRunner>(
    runner: &R,
    layout: &Layout,
    docs: &DocsConfig,
) -> Result<()> {
    if !layout.man_source_dir.is_dir() {
        return Err(anyhow!(
            "man page source directory {} not found",
            layout.man_source_dir.display()
        ));
    }
    if !layout.lock_file.is_file() {
        return Err(anyhow!(
            "doc dependency lock file {} not found",
            layout.lock_file.display()
        ));
    }
    let lock_file = layout.lock_file.to_string_lossy().into_owned();

    info!("installing doc generator");
    let install = CommandRequest::from_argv(&docs.install_command)?.arg(lock_file.clone());
    runner.run(&install).context("install doc generator")?;

    info!("building man pages");
    let build =
        CommandRequest::from_argv(&docs.build_command)?.current_dir(&layout.man_source_dir);
    runner.run(&build).context("build man pages")?;

    info!("removing doc generator");
    let remove = CommandRequest::from_argv(&docs.remove_command)?.arg(lock_file);
    runner.run(&remove).context("remove doc generator")?;
    Ok(())
}

/// Copy every built page (`name.<section>`) into `<man_root>/man<section>/`.
///
/// Returns the installed paths in a stable order. Finding no pages is an
/// error, since the build step is expected to produce at least one.
#[instrument(skip_all, fields(output = %layout.man_output_dir.display()))]
pub fn install_man_pages(layout: &Layout) -> Result<Vec<PathBuf>> {
    let pages = list_pages(&layout.man_output_dir)?;
    if pages.is_empty() {
        return Err(anyhow!(
            "no man pages found in {}",
            layout.man_output_dir.display()
        ));
    }

    let mut installed = Vec::with_capacity(pages.len());
    for (page, section) in pages {
        let section_dir = layout.man_root.join(format!("man{section}"));
        ensure_dir(&section_dir)?;
        let file_name = page
            .file_name()
            .ok_or_else(|| anyhow!("man page without file name: {}", page.display()))?;
        let dest = section_dir.join(file_name);
        install_file(&page, &dest)?;
        installed.push(dest);
    }
    info!(count = installed.len(), "installed man pages");
    Ok(installed)
}

/// Files in `dir` that look like man pages, sorted by path, with their section.
fn list_pages(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read man page output {}", dir.display()))?;
    let mut pages = Vec::new();
    for entry in entries {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match man_section(&path) {
            Some(section) => pages.push((path, section)),
            None => debug!(path = %path.display(), "skipping file without a man section"),
        }
    }
    pages.sort();
    Ok(pages)
}

/// Section directory digit of a man page file name: `sat.8` -> `8`, `sat-swap.3p` -> `3`.
///
/// A trailing `.gz` is looked through, so `sat.8.gz` -> `8`.
fn man_section(path: &Path) -> Option<String> {
    let path = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Path::new(path.file_stem()?),
        _ => path,
    };
    let ext = path.extension()?.to_str()?;
    let mut chars = ext.chars();
    let first = chars.next()?;
    if !('1'..='9').contains(&first) || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(first.to_string())
}

//! Orchestration for a full `provisioner run`.
//!
//! Executes every [`Step`] in order. The first failing step aborts the run:
//! later steps never execute and nothing already done is rolled back.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, info_span};

use crate::core::platform::Platform;
use crate::core::steps::Step;
use crate::io::completion::{install_completion, write_profile_script};
use crate::io::config::ProvisionConfig;
use crate::io::fs::ensure_dir_with_mode;
use crate::io::git::SourceFetcher;
use crate::io::http::HttpFetch;
use crate::io::kubectl::{ResolvedVersion, install_kubectl, resolve_version};
use crate::io::layout::Layout;
use crate::io::manpages::{build_man_pages, install_man_pages};
use crate::io::process::CommandRunner;

/// One completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub detail: String,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub root: PathBuf,
    pub steps: Vec<StepRecord>,
    pub kubectl: Option<ResolvedVersion>,
    pub kubectl_path: Option<PathBuf>,
}

/// The external seams a run talks to.
pub struct Provisioner<'a, R, F, H> {
    config: &'a ProvisionConfig,
    layout: Layout,
    runner: &'a R,
    fetcher: &'a F,
    http: &'a H,
}

impl<'a, R, F, H> Provisioner<'a, R, F, H>
where
    R: CommandRunner,
    F: SourceFetcher,
    H: HttpFetch,
{
    pub fn new(
        config: &'a ProvisionConfig,
        source: impl Into<PathBuf>,
        runner: &'a R,
        fetcher: &'a F,
        http: &'a H,
    ) -> Self {
        Self {
            layout: Layout::new(config, source),
            config,
            runner,
            fetcher,
            http,
        }
    }

    /// Run all steps in order, stopping at the first failure.
    pub fn run(&self) -> Result<ProvisionReport> {
        let mut report = ProvisionReport {
            root: self.layout.root.clone(),
            steps: Vec::with_capacity(Step::ALL.len()),
            kubectl: None,
            kubectl_path: None,
        };

        for step in Step::ALL {
            let span = info_span!("step", name = step.name(), position = step.position());
            let _guard = span.enter();
            info!("{}", step.description());
            let detail = self
                .run_step(step, &mut report)
                .with_context(|| format!("step {}/{} {step}", step.position(), Step::ALL.len()))?;
            info!(%detail, "step complete");
            report.steps.push(StepRecord { step, detail });
        }
        Ok(report)
    }

    fn run_step(&self, step: Step, report: &mut ProvisionReport) -> Result<String> {
        let cfg = self.config;
        let layout = &self.layout;
        match step {
            Step::LogDir => {
                ensure_dir_with_mode(&layout.log_dir)?;
                Ok(layout.log_dir.display().to_string())
            }
            Step::ManPagesBuild => {
                build_man_pages(self.runner, layout, &cfg.docs)?;
                Ok(layout.man_output_dir.display().to_string())
            }
            Step::ManPagesInstall => {
                let pages = install_man_pages(layout)?;
                Ok(format!("{} page(s) into {}", pages.len(), layout.man_root.display()))
            }
            Step::Completion => {
                let completion = install_completion(self.runner, layout, &cfg.completion_generator())?;
                let profile = write_profile_script(layout, &cfg.path_entry())?;
                Ok(format!("{}, {}", completion.display(), profile.display()))
            }
            Step::KubectlVersion => {
                let resolved = resolve_version(self.fetcher, self.http, &cfg.kubectl)?;
                report.kubectl = Some(resolved);
                Ok(format!("{} from {}", resolved.version, resolved.source.as_str()))
            }
            Step::KubectlInstall => {
                let resolved = report
                    .kubectl
                    .ok_or_else(|| anyhow!("kubectl version was not resolved"))?;
                let platform =
                    Platform::resolve(cfg.kubectl.os.as_deref(), cfg.kubectl.arch.as_deref())?;
                let path = install_kubectl(
                    self.http,
                    &cfg.kubectl,
                    &resolved.version,
                    &platform,
                    &layout.kubectl_path,
                )?;
                let detail = format!("{} {}", path.display(), resolved.version.tag());
                report.kubectl_path = Some(path);
                Ok(detail)
            }
        }
    }
}

//! The fixed, ordered provisioning steps.

use std::fmt;

use serde::Serialize;

/// One step of the provisioning procedure.
///
/// Steps always run in the order of [`Step::ALL`]; a failing step stops the
/// procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    LogDir,
    ManPagesBuild,
    ManPagesInstall,
    Completion,
    KubectlVersion,
    KubectlInstall,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::LogDir,
        Step::ManPagesBuild,
        Step::ManPagesInstall,
        Step::Completion,
        Step::KubectlVersion,
        Step::KubectlInstall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::LogDir => "log-dir",
            Step::ManPagesBuild => "man-pages-build",
            Step::ManPagesInstall => "man-pages-install",
            Step::Completion => "completion",
            Step::KubectlVersion => "kubectl-version",
            Step::KubectlInstall => "kubectl-install",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::LogDir => "ensure the log directory exists with mode 755",
            Step::ManPagesBuild => "install the doc generator, build man pages, remove the generator",
            Step::ManPagesInstall => "install built man pages into the system man directory",
            Step::Completion => "install shell completion and the PATH profile script",
            Step::KubectlVersion => "resolve the kubectl version from the pinned manifest",
            Step::KubectlInstall => "download kubectl and install it on the system path",
        }
    }

    pub fn from_name(name: &str) -> Option<Step> {
        Step::ALL.into_iter().find(|step| step.name() == name)
    }

    /// 1-indexed position in the procedure.
    pub fn position(&self) -> usize {
        Step::ALL
            .iter()
            .position(|step| step == self)
            .map_or(0, |idx| idx + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! Image build provisioner.
//!
//! Runs a fixed, linear sequence of provisioning steps inside a container
//! image build: log directory, man pages, shell completion, and a `kubectl`
//! binary pinned to a companion image's package manifest.
//!
//! - **[`core`]**: Pure logic (version extraction, platform naming, URL
//!   rendering, the step list). No I/O.
//! - **[`io`]**: Side-effecting adapters (filesystem, processes, git, HTTP),
//!   behind traits so tests can script them.
//!
//! [`provision`] drives the steps in order and stops at the first failure.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod provision;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! Side-effecting adapters used by the provisioning steps.

pub mod completion;
pub mod config;
pub mod fs;
pub mod git;
pub mod http;
pub mod kubectl;
pub mod layout;
pub mod manpages;
pub mod process;

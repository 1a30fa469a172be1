// nodeops-runtime: host access, collaborators, check engine, lifecycle orchestration
// Depends on nodeops-core

pub mod shell;
#[cfg(test)]
pub mod shell_mock;
pub mod ui;

pub mod allocation;
pub mod artifacts;
pub mod backend;
pub mod backup;
pub mod checks;
pub mod containers;
pub mod daemon;
pub mod firewall;
pub mod git;
pub mod guard;
pub mod host;
pub mod http;
pub mod options;
pub mod orchestrator;
pub mod store;
pub mod templates;
pub mod volume;

#[cfg(test)]
mod testutil;

//! # nodeops: lifecycle manager for a single container-based service node
//!
//! Facade crate that re-exports the nodeops workspace crates so consumers
//! can depend on a single `nodeops` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | nodeops-core | Params, allocation math, check reports, exit codes |
//! | [`runtime`] | nodeops-runtime | Shell, host checks, collaborators, orchestrator |
//! | [`cli`] | nodeops-cli | Command tree, UI, logging |

pub use nodeops_cli as cli;
pub use nodeops_core as core;
pub use nodeops_runtime as runtime;

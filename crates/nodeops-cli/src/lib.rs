// nodeops-cli: Clap commands, UI, logging
// Depends on nodeops-core, nodeops-runtime

pub mod commands;
pub mod display;
pub mod logging;
pub mod ui;

pub use commands::run;

// nodeops-core: Pure types, allocation policy, config
// No host access and no internal nodeops dependencies.

pub mod alloc;
pub mod checks;
pub mod config;
pub mod error;
pub mod meta;
pub mod options;
pub mod params;

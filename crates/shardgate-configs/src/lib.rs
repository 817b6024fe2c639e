//! shardgate-configs
//!
//! Gateway configuration types, loader and logging bootstrap.

pub mod config;
pub mod logging;

pub use config::*;
pub use config::defaults;
pub use logging::init_logging;

//! CLI command implementations

pub mod config;
pub mod probe;
pub mod serve;

pub use config::execute as config;
pub use probe::execute as probe;
pub use serve::execute as serve;

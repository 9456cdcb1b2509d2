//! CLI command handlers, one per file.

mod config;
mod get;
mod probe;

pub use config::run_config;
pub use get::{run_get, GetOptions};
#[cfg(test)]
pub use get::{destinations, tls_validation};
pub use probe::run_probe;

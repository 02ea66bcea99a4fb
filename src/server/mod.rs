//! Server module for Wayfarer
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup configuration checks
//! - `init`: Composition root and run loop

pub mod config;
mod init;
mod loader;
mod validation;

pub use init::run;
pub use loader::load_config;
pub use validation::validate_config;

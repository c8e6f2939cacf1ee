/*!
 * Core Module
 * Fundamental engine types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::EngineConfig;
pub use errors::*;
pub use types::*;

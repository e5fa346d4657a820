//! Shaderloop Common Utilities
//!
//! Shared infrastructure for all shaderloop crates:
//! - Error taxonomy and result alias
//! - Tracing/logging initialization
//! - Configuration loading
//! - External executable lookup

pub mod config;
pub mod error;
pub mod logging;
pub mod process;

pub use config::*;
pub use error::*;

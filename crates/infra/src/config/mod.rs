//! Configuration loading and management
//!
//! This module provides utilities for loading application configuration
//! from `CAREGATE_*` environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::load;

//! # CareGate Domain
//!
//! Domain types shared across the CareGate scheduling integration.
//!
//! This crate contains:
//! - The service error taxonomy and `Result` alias
//! - Typed settings for every subsystem
//! - Cache key namespaces and shared defaults
//!
//! ## Architecture
//! - No dependencies on other CareGate crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod settings;

// Re-export commonly used items
pub use errors::*;
pub use settings::*;

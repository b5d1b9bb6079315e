//! Data models
//!
//! Catalog entries served to the kiosk. The catalog itself is managed
//! elsewhere; these are read-only here.

pub mod food;

// Re-exports
pub use food::*;

//! Photostream core module
//!
//! This module contains the shared foundation for Photostream including:
//! - Configuration management
//! - Error types and handling
//! - Session lifecycle wiring

pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used items
pub use config::*;
pub use error::{PhotostreamError, Result};
pub use session::GallerySession;

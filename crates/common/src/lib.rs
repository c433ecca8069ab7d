//! Shadowcast Common Utilities
//!
//! Shared infrastructure for all Shadowcast crates:
//! - Error taxonomy and result alias
//! - Timecode parsing/formatting for transcoder output
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;

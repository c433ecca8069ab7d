//! Shadowcast Render Model
//!
//! Defines the core data contracts for the render pipeline:
//! - **Clip:** read-only clip metadata supplied by the clip catalog
//! - **Template:** one rendering intent (aspect, quality, repeat pattern,
//!   subtitle layers, font, background)
//! - **Job:** the persisted render job record and its state machine
//!
//! Output dimensions are always derived from the template's aspect ratio so
//! the compiler and downstream players agree on them.

pub mod clip;
pub mod error;
pub mod job;
pub mod template;

pub use clip::*;
pub use error::*;
pub use job::*;
pub use template::*;

//! Shadowcast Render Engine
//!
//! Drives ffmpeg to render shadow-practice clips:
//!
//! ```text
//! ClipRef + RenderTemplate
//!          │
//!          ▼
//!   compile() ── FilterGraph ──► CommandSpec
//!                                     │
//!                                     ▼
//!                         ProcessExecutor::execute ──► RenderResult
//!                                     ▲                (progress via stderr)
//!                                     │
//!   BatchOrchestrator: N × execute ───┴──► concat (-c copy) ──► one artifact
//! ```

pub mod batch;
pub mod compile;
pub mod executor;
pub mod filter;
pub mod probe;
pub mod progress;

#[cfg(all(test, unix))]
mod test_support;

pub use batch::{BatchOrchestrator, BatchPlan, TempSegments};
pub use compile::{compile, compile_concat, concat_manifest, CommandSpec, EncodeProfile};
pub use executor::{ProcessExecutor, RenderProgress, RenderResult, RenderStage};
pub use filter::{escape_value, Chain, Filter, FilterGraph};
pub use probe::{command_exists, probe_dimensions, probe_duration};
pub use progress::{ProgressParser, ProgressTracker};

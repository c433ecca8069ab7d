//! Shadowcast Render Service
//!
//! Accepts render requests, records them as jobs and runs them in the
//! background:
//!
//! ```text
//! submit ──► ClipCatalog ──► compile ──► JobStore (pending)
//!                                           │
//!            Semaphore permit ◄─────────────┘
//!                 │
//!                 ▼
//!      ProcessExecutor / BatchOrchestrator ──► progress channel ──► JobStore
//! ```

pub mod catalog;
pub mod progress;
pub mod service;
pub mod view;

pub use catalog::{ClipCatalog, InMemoryClipCatalog};
pub use progress::ProgressReporter;
pub use service::RenderService;
pub use view::JobStatusView;

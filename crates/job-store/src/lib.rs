//! Shadowcast Job Store
//!
//! Durable record of render jobs behind the [`JobStore`] trait:
//! - [`InMemoryJobStore`] for tests and one-shot CLI runs
//! - [`FileJobStore`] persisting a JSON snapshot after every mutation
//! - [`RetentionService`] deleting old terminal jobs in the background
//!
//! Both stores share one [`JobTable`] so the state machine, ordering and
//! cleanup rules are identical.

pub mod file;
pub mod memory;
pub mod retention;
pub mod store;
pub mod table;

pub use file::FileJobStore;
pub use memory::InMemoryJobStore;
pub use retention::RetentionService;
pub use store::{JobStore, UpdateOutcome};
pub use table::JobTable;

pub mod digest;
pub mod engine;
pub mod local;
pub mod plan;
pub mod upload;

pub use engine::{SyncEngine, SyncError, SyncSummary};

pub mod content_type;
pub mod engine;
mod error;
pub mod fingerprint;
pub mod remote_index;
pub mod report;
pub mod rewrite;
pub mod sweeper;
pub mod transfer;
pub mod walker;
pub mod worker;

pub use engine::{SyncEngine, SyncOptions, SyncReport};
pub use error::SyncError;

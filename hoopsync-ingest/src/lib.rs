//! Sync pipeline: per-source workflows that drive an adapter, resolve
//! entities into the canonical store, and account for every record on a
//! sync log.

pub mod config;
pub mod resolve;
pub mod sync;

pub use config::IngestConfig;
pub use sync::{SyncError, Syncer};

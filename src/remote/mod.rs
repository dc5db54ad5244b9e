//! Remote collaborators — the session-metadata API and cloud storage.
//!
//! Both are `async_trait` seams behind `Arc<dyn …>` so the orchestrator can
//! be exercised with hand-written doubles. Both treat a missing credential
//! as a configured-off state, not an error: the box keeps recording locally
//! when it runs standalone.

pub mod api;
pub mod storage;

pub use api::{ApiError, HttpSessionApi, SessionApi};
pub use storage::{DropboxStorage, Storage, StorageError};

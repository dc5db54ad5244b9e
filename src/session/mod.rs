//! Session layer — the public control surface over the capture loop.
//!
//! [`SessionRecorder`] is constructed once at process start and injected
//! into whatever needs it (trigger handler, status projector). It tracks
//! the current [`SessionContext`], drives record/stop against the capture
//! loop and runs the convert → upload → notify pipeline for each finished,
//! non-canceled take.

pub mod context;
pub mod orchestrator;
pub mod status;

pub use context::SessionContext;
pub use orchestrator::SessionRecorder;
pub use status::Status;

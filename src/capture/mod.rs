//! Capture core — the perpetual background capture loop and its per-take
//! state machine.
//!
//! # Design
//!
//! ```text
//! CaptureLoop (dedicated OS thread)
//!   loop forever:
//!     open stream → CaptureCycle::run
//!                     PreBuffering ──start requested──▶ Recording
//!                     Recording    ──stop requested───▶ Completed
//!                     (any I/O error ────────────────▶ Failed)
//! ```
//!
//! Control threads talk to the *currently active* cycle exclusively through
//! its four one-shot [`signal::Gate`]s — set once, never reset, so no lock
//! is needed beyond the gates themselves. A new, independently-lifetimed
//! cycle is allocated for every take; cycles are never reused.

pub mod cycle;
pub mod signal;
pub mod worker;

pub use cycle::{CaptureCycle, CycleSignals};
pub use signal::Gate;
pub use worker::CaptureLoop;

use std::path::PathBuf;
use thiserror::Error;

use crate::audio::{DeviceError, WavSinkError};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors surfaced by the capture layer.
///
/// `RecordDir` and a startup `Device` error are fatal configuration errors;
/// everything else aborts only the cycle it occurred in.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("audio device error: {0}")]
    Device(#[from] DeviceError),

    #[error("output sink error: {0}")]
    Sink(#[from] WavSinkError),

    #[error("recording directory {dir} is not writable: {source}")]
    RecordDir {
        dir: PathBuf,
        source: std::io::Error,
    },
}

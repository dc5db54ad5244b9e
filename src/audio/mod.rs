//! Audio layer — device selection, blocking chunk reads, pre-record ring
//! buffer and incremental WAV output.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → ChunkFramer → AudioChunk (mpsc)
//!           → ChunkSource::read_chunk (blocking)
//!           → ChunkRing (while pre-buffering) / WavSink (while recording)
//! ```
//!
//! The capture state machine in [`crate::capture`] only sees the
//! [`ChunkSource`] and [`StreamOpener`] traits; the cpal backend lives
//! entirely in [`device`].

pub mod device;
pub mod ring;
pub mod wav;

pub use device::{AudioChunk, ChunkSource, CpalStreamOpener, DeviceError, StreamOpener};
pub use ring::ChunkRing;
pub use wav::{WavSink, WavSinkError};

//! Stagebox — unattended session recorder for embedded hardware.
//!
//! A physical button toggles recording. A rolling pre-record buffer lets a
//! take retroactively include the seconds *before* the trigger. Finished
//! takes are loudness-normalized, transcoded to MP3, uploaded to cloud
//! storage and reported to a remote session API.
//!
//! # Architecture
//!
//! ```text
//! button edges → ButtonInterpreter → SessionRecorder::toggle
//!                                         │ record / stop
//!                                         ▼
//!               CaptureLoop (OS thread) ── CaptureCycle per take
//!                 pre-buffer ring → WAV file (optional prepend)
//!                                         │ finished filename
//!                                         ▼
//!               post-processing task (one at a time):
//!                 ffmpeg loudnorm → MP3 → Dropbox upload → API notify
//! ```
//!
//! The capture loop never stops: as soon as one [`capture::CaptureCycle`]
//! completes, a fresh one starts pre-buffering for the next take.

pub mod audio;
pub mod capture;
pub mod config;
pub mod remote;
pub mod session;
pub mod status;
pub mod transcode;
pub mod trigger;

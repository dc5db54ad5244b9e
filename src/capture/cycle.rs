//! One capture cycle — a single recording attempt from pre-buffering
//! through completion.
//!
//! A cycle exclusively owns its audio stream for its whole life. It starts
//! in *PreBuffering* (filling the rolling pre-record ring), transitions to
//! *Recording* when the start gate opens (computing a unique output
//! filename, acking the start, writing the WAV), and finishes when the stop
//! gate opens (finalizing the sink, acking completion). Any I/O error
//! aborts the cycle; the sink and stream are still released and the
//! completion gate still opens so a blocked `stop_recording` caller is not
//! stranded. The partial file is left on disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};

use crate::audio::{ChunkRing, ChunkSource, WavSink};
use crate::config::AudioConfig;

use super::signal::Gate;
use super::CaptureError;

// ---------------------------------------------------------------------------
// CycleSignals
// ---------------------------------------------------------------------------

/// The shared, thread-safe face of one capture cycle.
///
/// Control threads hold an `Arc<CycleSignals>` for the currently active
/// cycle and communicate purely through the four one-shot gates. The
/// filename is written once, before the started gate opens, and only read
/// after the completed gate opens.
pub struct CycleSignals {
    start_requested: Gate,
    recording_started: Gate,
    stop_requested: Gate,
    recording_completed: Gate,
    keep_prebuffer: AtomicBool,
    filename: Mutex<Option<PathBuf>>,
    failed: AtomicBool,
}

impl CycleSignals {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            start_requested: Gate::new(),
            recording_started: Gate::new(),
            stop_requested: Gate::new(),
            recording_completed: Gate::new(),
            keep_prebuffer: AtomicBool::new(false),
            filename: Mutex::new(None),
            failed: AtomicBool::new(false),
        })
    }

    /// Ask the cycle to leave pre-buffering and start recording.
    /// `keep_prebuffer` decides whether the rolling buffer is prepended to
    /// the output file.
    pub fn request_start(&self, keep_prebuffer: bool) {
        self.keep_prebuffer.store(keep_prebuffer, Ordering::SeqCst);
        self.start_requested.open();
    }

    /// Block until the cycle has acknowledged that recording began.
    pub fn wait_started(&self) {
        self.recording_started.wait();
    }

    /// Ask the cycle to finish the take.
    pub fn request_stop(&self) {
        self.stop_requested.open();
    }

    /// Block until the output file is fully flushed and closed.
    pub fn wait_completed(&self) {
        self.recording_completed.wait();
    }

    /// True once the cycle has acknowledged a start.
    pub fn has_started(&self) -> bool {
        self.recording_started.is_open()
    }

    /// True once the cycle has finished (successfully or not).
    pub fn is_completed(&self) -> bool {
        self.recording_completed.is_open()
    }

    /// True when the cycle aborted on an I/O error.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// The computed output path. Present from the moment the started gate
    /// opens.
    pub fn filename(&self) -> Option<PathBuf> {
        self.filename.lock().unwrap().clone()
    }

    fn set_filename(&self, path: PathBuf) {
        *self.filename.lock().unwrap() = Some(path);
    }
}

// ---------------------------------------------------------------------------
// CaptureCycle
// ---------------------------------------------------------------------------

/// A single recording attempt bound to one open audio stream.
pub struct CaptureCycle {
    source: Box<dyn ChunkSource>,
    signals: Arc<CycleSignals>,
    ring: ChunkRing,
    audio: AudioConfig,
    record_dir: PathBuf,
}

impl CaptureCycle {
    /// Bind a fresh cycle to an open stream. The pre-record ring is created
    /// anew here and discarded once recording begins.
    pub fn new(source: Box<dyn ChunkSource>, audio: AudioConfig, record_dir: PathBuf) -> Self {
        let capacity = audio.prebuffer_chunks().max(1);
        Self {
            source,
            signals: CycleSignals::new(),
            ring: ChunkRing::new(capacity),
            audio,
            record_dir,
        }
    }

    /// Shared handle for control threads.
    pub fn signals(&self) -> Arc<CycleSignals> {
        Arc::clone(&self.signals)
    }

    /// Drive the cycle to completion.
    ///
    /// Cleanup is unconditional: whatever happens, the sink is finalized
    /// (via scoped release), the completion gate opens, and dropping `self`
    /// closes the stream.
    pub fn run(mut self) -> Result<(), CaptureError> {
        let result = self.pre_buffer().and_then(|_| self.record());

        if let Err(e) = &result {
            self.signals.failed.store(true, Ordering::SeqCst);
            log::error!("capture cycle aborted: {e}");
        }

        self.signals.recording_completed.open();
        // `self.source` dropped here — stream stopped and closed.
        result
    }

    /// PreBuffering: keep the rolling ring topped up until a start request
    /// arrives. Stops appending as soon as the trigger is observed.
    fn pre_buffer(&mut self) -> Result<(), CaptureError> {
        log::info!("buffering");
        while !self.signals.start_requested.is_open() {
            let chunk = self.source.read_chunk()?;
            self.ring.push(chunk);
        }
        Ok(())
    }

    /// Recording: ack the start, write chunks until a stop request arrives,
    /// then flush and close the file.
    fn record(&mut self) -> Result<(), CaptureError> {
        let path = unique_filename(&self.record_dir, Local::now());
        self.signals.set_filename(path.clone());
        log::info!("recording to {}", path.display());

        // The ack comes before the sink opens: callers of start_recording
        // resume as soon as the take is committed to this filename.
        self.signals.recording_started.open();

        let mut sink = WavSink::create(&path, &self.audio)?;

        if self.signals.keep_prebuffer.load(Ordering::SeqCst) {
            // Buffered audio is written as-is; its format is assumed to
            // match the newly opened stream and is not re-validated.
            let buffered = self.ring.drain();
            log::info!("prepending {} pre-buffered samples", buffered.len());
            sink.write_samples(&buffered)?;
        }

        while !self.signals.stop_requested.is_open() {
            let chunk = self.source.read_chunk()?;
            sink.write_samples(&chunk)?;
        }

        sink.finalize()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// unique_filename
// ---------------------------------------------------------------------------

/// Timestamp-derived output path, escalating a numeric suffix until a free
/// path is found so takes within the same minute never overwrite each other.
pub(crate) fn unique_filename(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = now.format("%Y-%m-%d_%H-%M");
    let mut candidate = dir.join(format!("{stem}.wav"));
    let mut i = 0u32;
    while candidate.exists() {
        i += 1;
        candidate = dir.join(format!("{stem}-{i}.wav"));
    }
    candidate
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

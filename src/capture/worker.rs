//! The perpetual capture loop.
//!
//! [`CaptureLoop::start`] validates the recording directory, takes ownership
//! of the stream opener (the device was resolved when the opener was built)
//! and spawns a dedicated OS thread that forever constructs fresh
//! [`CaptureCycle`]s — giving the outside world the illusion of a single,
//! continuously available "current cycle".
//!
//! `start_recording` / `stop_recording` may be called from any thread while
//! the loop runs; they communicate with the active cycle purely through its
//! one-shot gates.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use crate::audio::StreamOpener;
use crate::config::AudioConfig;

use super::cycle::{CaptureCycle, CycleSignals};
use super::CaptureError;

// ---------------------------------------------------------------------------
// CaptureLoop
// ---------------------------------------------------------------------------

/// Handle to the running capture loop.
///
/// The loop thread is never joined: it runs for the process lifetime. An
/// unrecoverable stream-open failure logs an error and ends the thread;
/// restarting the process is an operational concern.
pub struct CaptureLoop {
    /// The active cycle's signals. Written only by the loop thread between
    /// cycles; read by any control thread.
    current: Arc<RwLock<Arc<CycleSignals>>>,
    ready: Arc<AtomicBool>,
    _thread: thread::JoinHandle<()>,
}

impl CaptureLoop {
    /// Validate startup configuration and launch the loop thread.
    ///
    /// Fails fast with [`CaptureError::RecordDir`] when the recording
    /// directory cannot be created or written — the process must not report
    /// ready in that state.
    pub fn start(
        audio: AudioConfig,
        record_dir: PathBuf,
        mut opener: Box<dyn StreamOpener>,
    ) -> Result<Self, CaptureError> {
        verify_writable(&record_dir)?;

        // Placeholder until the first cycle publishes itself; it never
        // starts, so control calls against it are rejected as protocol
        // misuse.
        let current = Arc::new(RwLock::new(CycleSignals::new()));
        let ready = Arc::new(AtomicBool::new(false));

        let thread = {
            let current = Arc::clone(&current);
            let ready = Arc::clone(&ready);

            thread::Builder::new()
                .name("capture-loop".into())
                .spawn(move || loop {
                    let source = match opener.open() {
                        Ok(source) => source,
                        Err(e) => {
                            ready.store(false, Ordering::SeqCst);
                            log::error!("cannot open audio stream: {e}; capture loop terminating");
                            return;
                        }
                    };

                    let cycle = CaptureCycle::new(source, audio.clone(), record_dir.clone());
                    *current.write().unwrap() = cycle.signals();
                    ready.store(true, Ordering::SeqCst);

                    // A failed cycle was already logged; the loop recovers
                    // by starting a fresh one.
                    let _ = cycle.run();
                })
                .expect("failed to spawn capture-loop thread")
        };

        Ok(Self {
            current,
            ready,
            _thread: thread,
        })
    }

    /// Trigger recording on the current cycle and block until it has truly
    /// begun.
    ///
    /// Protocol misuse (already recording, or the loop is not ready yet) is
    /// logged and ignored.
    pub fn start_recording(&self, prepend_prebuffer: bool) {
        if !self.is_ready() {
            log::warn!("start_recording ignored: capture loop not ready");
            return;
        }

        let signals = self.current();
        if signals.is_completed() {
            // The published cycle already died (failed during
            // pre-buffering) and its replacement is not live yet. Waiting
            // on its gates would block forever.
            log::warn!("start_recording ignored: cycle finished, replacement pending");
            return;
        }
        if signals.has_started() {
            log::warn!("start_recording ignored: recording already started");
            return;
        }

        signals.request_start(prepend_prebuffer);
        signals.wait_started();
    }

    /// Stop the current take and block until its file is flushed and
    /// closed. Returns the take's path, or `None` when nothing was
    /// recording (logged, state unchanged).
    pub fn stop_recording(&self) -> Option<PathBuf> {
        let signals = self.current();
        if !signals.has_started() {
            log::warn!("stop_recording ignored: no recording in progress");
            return None;
        }
        if signals.is_completed() {
            // The take already ended on its own (I/O failure). The partial
            // file stays on disk but is not handed to post-processing.
            log::warn!("stop_recording ignored: take already ended");
            return None;
        }

        signals.request_stop();
        signals.wait_completed();
        signals.filename()
    }

    /// True between a start ack and the matching completion.
    pub fn is_recording(&self) -> bool {
        let signals = self.current();
        signals.has_started() && !signals.is_completed()
    }

    /// True once startup validation passed and the first cycle is live.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn current(&self) -> Arc<CycleSignals> {
        Arc::clone(&self.current.read().unwrap())
    }
}

// ---------------------------------------------------------------------------
// verify_writable
// ---------------------------------------------------------------------------

/// The recording directory must exist and accept writes before the loop is
/// allowed to report ready.
fn verify_writable(dir: &Path) -> Result<(), CaptureError> {
    let fail = |source: std::io::Error| CaptureError::RecordDir {
        dir: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(fail)?;

    let probe = dir.join(".stagebox-write-probe");
    std::fs::write(&probe, b"probe").map_err(fail)?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Application entry point — stagebox session recorder.
//!
//! # Startup sequence
//!
//! 1. Load [`Settings`] from disk plus environment overrides.
//! 2. Initialise logging (target per config; journald reads stdout).
//! 3. Open the audio device and launch the capture loop — both fail fast,
//!    a box that cannot record must not come up as ready.
//! 4. Create the tokio runtime (multi-thread, 2 workers).
//! 5. Build the remote collaborators and the [`SessionRecorder`].
//! 6. Spawn the status projector and the stdin button stand-in.
//! 7. Run the trigger loop on the runtime — blocks for the process
//!    lifetime.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use stagebox::{
    audio::CpalStreamOpener,
    capture::CaptureLoop,
    config::Settings,
    remote::{DropboxStorage, HttpSessionApi},
    session::SessionRecorder,
    status::{LogIndicator, StatusProjector},
    transcode::FfmpegTranscoder,
    trigger::{run_triggers, ButtonEvent},
};

// ---------------------------------------------------------------------------
// Stdin button stand-in
// ---------------------------------------------------------------------------

/// Feed button events from stdin for bench runs without the hardware.
///
/// `l` or `long` emulates a long press (held past the threshold, then
/// released); any other line is a short press. The GPIO driver on the
/// deployment target feeds the same channel.
fn spawn_stdin_buttons(tx: mpsc::Sender<ButtonEvent>) {
    std::thread::Builder::new()
        .name("stdin-buttons".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => {
                        log::info!("stdin closed - button stand-in exiting");
                        return;
                    }
                    Ok(_) => {}
                }

                let long = matches!(line.trim(), "l" | "long");
                if long && tx.blocking_send(ButtonEvent::Held).is_err() {
                    return;
                }
                if tx.blocking_send(ButtonEvent::Released).is_err() {
                    return;
                }
            }
        })
        .expect("failed to spawn stdin-buttons thread");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("failed to load settings ({e}); using defaults");
        Settings::default()
    });

    // 2. Logging
    let log_target = match settings.log.target {
        stagebox::config::LogTarget::Stdout => env_logger::Target::Stdout,
        stagebox::config::LogTarget::Stderr => env_logger::Target::Stderr,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(log_target)
        .init();
    log::info!("stagebox starting up");

    // 3. Audio device and capture loop — fail fast, the box is useless
    //    without them.
    let opener = CpalStreamOpener::new(&settings.audio)?;
    let capture = Arc::new(CaptureLoop::start(
        settings.audio.clone(),
        PathBuf::from(&settings.paths.record_dir),
        Box::new(opener),
    )?);

    let process_dir = PathBuf::from(&settings.paths.process_dir);
    std::fs::create_dir_all(&process_dir)?;

    // 4. Tokio runtime (2 workers — trigger loop plus one pipeline)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 5. Recorder and its collaborators
    let recorder = Arc::new(SessionRecorder::new(
        capture,
        Arc::new(HttpSessionApi::from_config(&settings.api)),
        Arc::new(DropboxStorage::from_config(&settings.storage)),
        Arc::new(FfmpegTranscoder::new(process_dir)),
        settings.storage.default_dir.clone(),
    ));

    // 6. Channels: raw button events in, status-refresh kicks out
    let (button_tx, button_rx) = mpsc::channel::<ButtonEvent>(16);
    let (kick_tx, kick_rx) = mpsc::channel::<()>(4);

    let status_source: Arc<dyn stagebox::status::StatusSource> = recorder.clone();
    let projector = StatusProjector::new(status_source, Arc::new(LogIndicator));
    rt.spawn(projector.run(kick_rx));

    spawn_stdin_buttons(button_tx);

    // 7. Trigger loop — runs until the button channel closes
    rt.block_on(run_triggers(recorder, button_rx, kick_tx));

    log::info!("stagebox shutting down");
    Ok(())
}

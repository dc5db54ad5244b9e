//! Session orchestrator — record/stop control, context tracking and the
//! post-processing pipeline.
//!
//! # Pipeline flow
//!
//! ```text
//! record(pre_capture)
//!   └─▶ spawn_blocking(capture.start_recording)   [blocks until started ack]
//!         └─▶ refresh context from session API    [degrade to default]
//!
//! stop(canceled)
//!   └─▶ spawn_blocking(capture.stop_recording)    [blocks until file closed]
//!         ├─ canceled      → discard result, file stays on disk
//!         └─ Some(file)    → tokio::spawn(post-processing task)
//!                              lock processing mutex  [one pipeline at a time]
//!                              spawn_blocking(transcoder.convert)
//!                              storage.upload          [no-op without token]
//!                              api.notify_complete     [needs token and id]
//! ```
//!
//! Every external-service failure degrades with a log entry; none aborts
//! the capture loop or crashes the pipeline task.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::capture::CaptureLoop;
use crate::remote::{SessionApi, Storage};
use crate::transcode::Transcoder;

use super::context::SessionContext;
use super::status::Status;

// ---------------------------------------------------------------------------
// SessionRecorder
// ---------------------------------------------------------------------------

/// The one orchestrator instance, constructed at process start.
pub struct SessionRecorder {
    capture: Arc<CaptureLoop>,
    /// Current session context; replaced wholesale on each recording start.
    context: Mutex<SessionContext>,
    /// Held for the duration of one post-processing pipeline. A second
    /// completed take blocks here until the first finishes — intentional
    /// backpressure, not an error.
    processing: Arc<AsyncMutex<()>>,
    api: Arc<dyn SessionApi>,
    storage: Arc<dyn Storage>,
    transcoder: Arc<dyn Transcoder>,
    default_upload_dir: String,
}

impl SessionRecorder {
    pub fn new(
        capture: Arc<CaptureLoop>,
        api: Arc<dyn SessionApi>,
        storage: Arc<dyn Storage>,
        transcoder: Arc<dyn Transcoder>,
        default_upload_dir: String,
    ) -> Self {
        Self {
            capture,
            context: Mutex::new(SessionContext::local_default(&default_upload_dir)),
            processing: Arc::new(AsyncMutex::new(())),
            api,
            storage,
            transcoder,
            default_upload_dir,
        }
    }

    /// Start a take. Returns once recording has been acknowledged; only
    /// then is the session context refreshed, so a slow API call can never
    /// delay the actual capture.
    pub async fn record(&self, pre_capture: bool) {
        if self.capture.is_recording() {
            // The active take keeps its context; a refresh here would
            // redirect it to whatever the API answers now.
            log::warn!("record ignored: take already in progress");
            return;
        }

        let capture = Arc::clone(&self.capture);
        if let Err(e) =
            tokio::task::spawn_blocking(move || capture.start_recording(pre_capture)).await
        {
            log::error!("start_recording task panicked: {e}");
            return;
        }

        self.refresh_context().await;
    }

    /// Stop the current take.
    ///
    /// `canceled` discards the result — the file stays on disk untouched
    /// but no post-processing happens. Otherwise a finished filename
    /// launches the pipeline task against a snapshot of the context.
    pub async fn stop(&self, canceled: bool) {
        let capture = Arc::clone(&self.capture);
        let recorded = match tokio::task::spawn_blocking(move || capture.stop_recording()).await {
            Ok(recorded) => recorded,
            Err(e) => {
                log::error!("stop_recording task panicked: {e}");
                return;
            }
        };

        if canceled {
            log::info!("take canceled; keeping file, skipping post-processing");
            return;
        }

        let Some(file) = recorded else {
            // stop_recording already logged the protocol misuse.
            return;
        };

        let snapshot = self.context.lock().unwrap().clone();
        self.spawn_post_process(file, snapshot);
    }

    /// Short press toggles record/stop; long press records with the
    /// pre-buffer included, or cancels a running take.
    pub async fn toggle(&self, long: bool) {
        if !self.capture.is_recording() {
            self.record(long).await;
        } else {
            self.stop(long).await;
        }
    }

    /// Derive the lifecycle status from observable state.
    pub fn status(&self) -> Status {
        if !self.capture.is_ready() {
            Status::Initializing
        } else if self.capture.is_recording() {
            Status::Recording
        } else if self.processing.try_lock().is_err() {
            Status::Processing
        } else {
            Status::Ready
        }
    }

    /// Snapshot of the current session context.
    pub fn current_context(&self) -> SessionContext {
        self.context.lock().unwrap().clone()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Replace the context from the session API, degrading to the local
    /// default on any miss: no credential, non-success response, transport
    /// failure. Never retried.
    async fn refresh_context(&self) {
        let context = match self.api.fetch_session().await {
            Ok(Some(context)) => context,
            Ok(None) => {
                log::info!("no API token configured - using default session");
                SessionContext::local_default(&self.default_upload_dir)
            }
            Err(e) => {
                log::warn!("session fetch failed ({e}); using default session");
                SessionContext::local_default(&self.default_upload_dir)
            }
        };

        *self.context.lock().unwrap() = context;
    }

    fn spawn_post_process(&self, file: PathBuf, context: SessionContext) {
        let processing = Arc::clone(&self.processing);
        let api = Arc::clone(&self.api);
        let storage = Arc::clone(&self.storage);
        let transcoder = Arc::clone(&self.transcoder);

        tokio::spawn(async move {
            let _guard = processing.lock().await;
            post_process(file, context, transcoder, storage, api).await;
        });
    }
}

// ---------------------------------------------------------------------------
// post_process
// ---------------------------------------------------------------------------

/// Convert → upload → notify for one finished take.
///
/// A transcode failure ends the pipeline (there is nothing to deliver);
/// upload and notify failures are logged and skipped so a flaky network
/// never loses the local files.
async fn post_process(
    file: PathBuf,
    context: SessionContext,
    transcoder: Arc<dyn Transcoder>,
    storage: Arc<dyn Storage>,
    api: Arc<dyn SessionApi>,
) {
    let source = file.clone();
    let processed = match tokio::task::spawn_blocking(move || transcoder.convert(&source)).await {
        Ok(Ok(processed)) => processed,
        Ok(Err(e)) => {
            log::error!("transcode failed for {}: {e}", file.display());
            return;
        }
        Err(e) => {
            log::error!("transcode task panicked: {e}");
            return;
        }
    };

    if let Err(e) = storage.upload(&processed, &context.upload_path).await {
        log::error!("upload failed for {}: {e}", processed.display());
    }

    if let Some(id) = context.id {
        if let Err(e) = api.notify_complete(id).await {
            log::warn!("completion notify failed for session {id}: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioChunk, ChunkSource, DeviceError, StreamOpener};
    use crate::config::AudioConfig;
    use crate::remote::{ApiError, StorageError};
    use crate::transcode::TranscodeError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    // -----------------------------------------------------------------------
    // Capture-side test doubles
    // -----------------------------------------------------------------------

    struct PacedSource;

    impl ChunkSource for PacedSource {
        fn read_chunk(&mut self) -> Result<AudioChunk, DeviceError> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(vec![1; 4])
        }
    }

    struct PacedOpener;

    impl StreamOpener for PacedOpener {
        fn open(&mut self) -> Result<Box<dyn ChunkSource>, DeviceError> {
            Ok(Box::new(PacedSource))
        }
    }

    fn test_capture(dir: &Path) -> Arc<CaptureLoop> {
        let audio = AudioConfig {
            chunk_size: 2,
            bit_depth: 16,
            sample_rate: 8,
            channels: 2,
            prerecord_secs: 1,
            device_name: None,
        };
        let capture = CaptureLoop::start(audio, dir.to_path_buf(), Box::new(PacedOpener))
            .expect("capture loop");
        while !capture.is_ready() {
            std::thread::sleep(Duration::from_millis(1));
        }
        Arc::new(capture)
    }

    // -----------------------------------------------------------------------
    // Collaborator test doubles
    // -----------------------------------------------------------------------

    /// Scripted session API: one fixed fetch behavior, notify calls logged.
    struct MockApi {
        fetch: Result<Option<SessionContext>, ()>,
        notified: Mutex<Vec<i64>>,
    }

    impl MockApi {
        fn returning(ctx: SessionContext) -> Self {
            Self {
                fetch: Ok(Some(ctx)),
                notified: Mutex::new(Vec::new()),
            }
        }

        fn no_token() -> Self {
            Self {
                fetch: Ok(None),
                notified: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fetch: Err(()),
                notified: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SessionApi for MockApi {
        async fn fetch_session(&self) -> Result<Option<SessionContext>, ApiError> {
            match &self.fetch {
                Ok(ctx) => Ok(ctx.clone()),
                Err(()) => Err(ApiError::Status(500)),
            }
        }

        async fn notify_complete(&self, id: i64) -> Result<(), ApiError> {
            self.notified.lock().unwrap().push(id);
            Ok(())
        }
    }

    /// Returns a different session on every fetch, so a test can tell
    /// exactly which call populated the context.
    struct CountingApi {
        calls: Mutex<i64>,
    }

    impl CountingApi {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionApi for CountingApi {
        async fn fetch_session(&self) -> Result<Option<SessionContext>, ApiError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(Some(SessionContext {
                upload_path: format!("/fetch/{calls}"),
                title: None,
                id: Some(*calls),
            }))
        }

        async fn notify_complete(&self, _id: i64) -> Result<(), ApiError> {
            Ok(())
        }
    }

    /// Records every upload; never fails.
    struct MockStorage {
        uploads: Mutex<Vec<(PathBuf, String)>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Storage for MockStorage {
        async fn upload(&self, file: &Path, dest_dir: &str) -> Result<(), StorageError> {
            self.uploads
                .lock()
                .unwrap()
                .push((file.to_path_buf(), dest_dir.to_string()));
            Ok(())
        }
    }

    /// Records begin/end events (for the mutual-exclusion test) and maps
    /// `x.wav` to `x.mp3`.
    struct MockTranscoder {
        events: Mutex<Vec<&'static str>>,
        delay: Duration,
    }

    impl MockTranscoder {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }

        fn slow() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                delay: Duration::from_millis(50),
            }
        }

        fn call_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|&&e| e == "begin")
                .count()
        }
    }

    impl Transcoder for MockTranscoder {
        fn convert(&self, source: &Path) -> Result<PathBuf, TranscodeError> {
            self.events.lock().unwrap().push("begin");
            std::thread::sleep(self.delay);
            self.events.lock().unwrap().push("end");
            Ok(source.with_extension("mp3"))
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        recorder: SessionRecorder,
        api: Arc<MockApi>,
        storage: Arc<MockStorage>,
        transcoder: Arc<MockTranscoder>,
        _dir: TempDir,
    }

    fn harness(api: MockApi, transcoder: MockTranscoder) -> Harness {
        let dir = TempDir::new().expect("temp dir");
        let capture = test_capture(dir.path());
        let api = Arc::new(api);
        let storage = Arc::new(MockStorage::new());
        let transcoder = Arc::new(transcoder);

        let recorder = SessionRecorder::new(
            capture,
            Arc::clone(&api) as Arc<dyn SessionApi>,
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&transcoder) as Arc<dyn Transcoder>,
            "/default".into(),
        );

        Harness {
            recorder,
            api,
            storage,
            transcoder,
            _dir: dir,
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never became true");
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Immediately after `record` returns, a concurrent status query must
    /// read Recording, never Ready.
    #[tokio::test]
    async fn record_is_observable_as_recording() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        assert_eq!(h.recorder.status(), Status::Ready);
        h.recorder.record(false).await;
        assert_eq!(h.recorder.status(), Status::Recording);

        h.recorder.stop(true).await;
    }

    #[tokio::test]
    async fn record_replaces_context_from_api() {
        let ctx = SessionContext {
            upload_path: "/gigs/42".into(),
            title: Some("friday night".into()),
            id: Some(42),
        };
        let h = harness(MockApi::returning(ctx.clone()), MockTranscoder::new());

        h.recorder.record(false).await;
        assert_eq!(h.recorder.current_context(), ctx);

        h.recorder.stop(true).await;
    }

    /// A `record` call landing while a take is already running must leave
    /// the active take's context untouched — otherwise the eventual stop
    /// would deliver to whatever the API answers now.
    #[tokio::test]
    async fn record_during_active_take_keeps_context() {
        let dir = TempDir::new().expect("temp dir");
        let capture = test_capture(dir.path());
        let recorder = SessionRecorder::new(
            capture,
            Arc::new(CountingApi::new()),
            Arc::new(MockStorage::new()),
            Arc::new(MockTranscoder::new()),
            "/default".into(),
        );

        recorder.record(false).await;
        assert_eq!(recorder.current_context().upload_path, "/fetch/1");

        recorder.record(false).await; // rejected, no refetch
        assert_eq!(recorder.current_context().upload_path, "/fetch/1");

        recorder.stop(true).await;
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_default_context() {
        let h = harness(MockApi::failing(), MockTranscoder::new());

        h.recorder.record(false).await;
        let ctx = h.recorder.current_context();
        assert_eq!(ctx.upload_path, "/default");
        assert!(ctx.id.is_none());

        h.recorder.stop(true).await;
    }

    #[tokio::test]
    async fn no_token_falls_back_to_default_context() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        h.recorder.record(false).await;
        let ctx = h.recorder.current_context();
        assert_eq!(ctx.upload_path, "/default");
        assert!(ctx.id.is_none());

        h.recorder.stop(true).await;
    }

    /// `stop(canceled)` after a started take: the file exists on disk but
    /// no post-processing runs.
    #[tokio::test]
    async fn canceled_stop_skips_post_processing() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        h.recorder.record(false).await;
        h.recorder.stop(true).await;

        // Give a wrongly spawned pipeline a chance to show itself.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transcoder.call_count(), 0);
        assert!(h.storage.uploads.lock().unwrap().is_empty());

        let takes: Vec<_> = std::fs::read_dir(h._dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "wav"))
            .collect();
        assert_eq!(takes.len(), 1, "canceled take stays on disk");
    }

    #[tokio::test]
    async fn stop_without_record_launches_nothing() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        h.recorder.stop(false).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transcoder.call_count(), 0);
    }

    #[tokio::test]
    async fn pipeline_converts_uploads_and_notifies() {
        let ctx = SessionContext {
            upload_path: "/gigs/7".into(),
            title: None,
            id: Some(7),
        };
        let h = harness(MockApi::returning(ctx), MockTranscoder::new());

        h.recorder.record(false).await;
        h.recorder.stop(false).await;

        wait_until(|| !h.storage.uploads.lock().unwrap().is_empty()).await;

        let uploads = h.storage.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        let (file, dest) = &uploads[0];
        assert_eq!(dest, "/gigs/7");
        assert!(file.extension().is_some_and(|x| x == "mp3"));

        wait_until(|| !h.api.notified.lock().unwrap().is_empty()).await;
        assert_eq!(*h.api.notified.lock().unwrap(), vec![7]);
    }

    /// Without a session id there is no completion notification, even
    /// though the upload still happens.
    #[tokio::test]
    async fn pipeline_skips_notify_without_id() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        h.recorder.record(false).await;
        h.recorder.stop(false).await;

        wait_until(|| !h.storage.uploads.lock().unwrap().is_empty()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.api.notified.lock().unwrap().is_empty());
    }

    /// Two completed takes: pipeline B must not begin before pipeline A
    /// has fully finished.
    #[tokio::test]
    async fn pipelines_are_mutually_exclusive() {
        let h = harness(MockApi::no_token(), MockTranscoder::slow());

        for _ in 0..2 {
            h.recorder.record(false).await;
            h.recorder.stop(false).await;
            // Let the loop publish a fresh cycle before the next take.
            wait_until(|| h.recorder.capture.is_ready() && !h.recorder.capture.is_recording())
                .await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        wait_until(|| h.storage.uploads.lock().unwrap().len() == 2).await;

        let events = h.transcoder.events.lock().unwrap().clone();
        assert_eq!(events, vec!["begin", "end", "begin", "end"]);
    }

    /// While a pipeline holds the processing lock, the derived status reads
    /// Processing.
    #[tokio::test]
    async fn status_reads_processing_while_pipeline_runs() {
        let h = harness(MockApi::no_token(), MockTranscoder::slow());

        h.recorder.record(false).await;
        h.recorder.stop(false).await;

        wait_until(|| h.recorder.status() == Status::Processing).await;
        wait_until(|| h.recorder.status() == Status::Ready).await;
    }

    #[tokio::test]
    async fn toggle_maps_press_kinds() {
        let h = harness(MockApi::no_token(), MockTranscoder::new());

        h.recorder.toggle(false).await; // short press → record
        assert_eq!(h.recorder.status(), Status::Recording);

        h.recorder.toggle(true).await; // long press while recording → cancel
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transcoder.call_count(), 0);
    }
}

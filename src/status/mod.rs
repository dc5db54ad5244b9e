//! Status projection — from recorder state to an operator-visible signal.
//!
//! The projector polls the recorder once a second (and immediately on a
//! kick from the trigger loop), maps the status to an LED pattern, and
//! pushes it to an [`Indicator`] only when it changed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::session::{SessionRecorder, Status};

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Anything whose coarse status can be read.
pub trait StatusSource: Send + Sync {
    fn status(&self) -> Status;
}

impl StatusSource for SessionRecorder {
    fn status(&self) -> Status {
        SessionRecorder::status(self)
    }
}

/// Output side of the projection — an LED driver, a log line, a display.
pub trait Indicator: Send + Sync {
    fn show(&self, status: Status, pattern: LedPattern);
}

// ---------------------------------------------------------------------------
// LED patterns
// ---------------------------------------------------------------------------

/// Blink pattern for the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Off,
    Solid,
    SlowBlink,
    FastBlink,
}

/// Fixed status-to-pattern mapping.
pub fn led_pattern(status: Status) -> LedPattern {
    match status {
        Status::Initializing => LedPattern::Off,
        Status::Ready => LedPattern::Solid,
        Status::Recording => LedPattern::SlowBlink,
        Status::Processing => LedPattern::FastBlink,
    }
}

// ---------------------------------------------------------------------------
// LogIndicator
// ---------------------------------------------------------------------------

/// Indicator that announces status changes on the log.
///
/// The deployment target drives a GPIO LED instead; this one serves
/// development and headless bench runs.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&self, status: Status, pattern: LedPattern) {
        log::info!("status: {} (led {:?})", status.label(), pattern);
    }
}

// ---------------------------------------------------------------------------
// StatusProjector
// ---------------------------------------------------------------------------

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct StatusProjector {
    source: Arc<dyn StatusSource>,
    indicator: Arc<dyn Indicator>,
}

impl StatusProjector {
    pub fn new(source: Arc<dyn StatusSource>, indicator: Arc<dyn Indicator>) -> Self {
        Self { source, indicator }
    }

    /// Poll until the kick channel closes. Unchanged statuses are
    /// suppressed; the first observation is always shown.
    pub async fn run(self, mut kick: mpsc::Receiver<()>) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let mut last: Option<Status> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                kicked = kick.recv() => {
                    if kicked.is_none() {
                        log::debug!("status kick channel closed - projector exiting");
                        return;
                    }
                }
            }

            let status = self.source.status();
            if last != Some(status) {
                self.indicator.show(status, led_pattern(status));
                last = Some(status);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedSource {
        status: Mutex<Status>,
    }

    impl FixedSource {
        fn new(status: Status) -> Arc<Self> {
            Arc::new(Self {
                status: Mutex::new(status),
            })
        }

        fn set(&self, status: Status) {
            *self.status.lock().unwrap() = status;
        }
    }

    impl StatusSource for FixedSource {
        fn status(&self) -> Status {
            *self.status.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct RecordingIndicator {
        shown: Mutex<Vec<(Status, LedPattern)>>,
    }

    impl Indicator for RecordingIndicator {
        fn show(&self, status: Status, pattern: LedPattern) {
            self.shown.lock().unwrap().push((status, pattern));
        }
    }

    #[test]
    fn pattern_mapping() {
        assert_eq!(led_pattern(Status::Initializing), LedPattern::Off);
        assert_eq!(led_pattern(Status::Ready), LedPattern::Solid);
        assert_eq!(led_pattern(Status::Recording), LedPattern::SlowBlink);
        assert_eq!(led_pattern(Status::Processing), LedPattern::FastBlink);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_status_is_shown_once() {
        let source = FixedSource::new(Status::Ready);
        let indicator = Arc::new(RecordingIndicator::default());
        let projector = StatusProjector::new(source.clone(), indicator.clone());

        let (kick_tx, kick_rx) = mpsc::channel(4);
        let handle = tokio::spawn(projector.run(kick_rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(kick_tx);
        handle.await.unwrap();

        let shown = indicator.shown.lock().unwrap();
        assert_eq!(shown.as_slice(), &[(Status::Ready, LedPattern::Solid)]);
    }

    #[tokio::test(start_paused = true)]
    async fn kick_surfaces_a_change_before_the_next_tick() {
        let source = FixedSource::new(Status::Ready);
        let indicator = Arc::new(RecordingIndicator::default());
        let projector = StatusProjector::new(source.clone(), indicator.clone());

        let (kick_tx, kick_rx) = mpsc::channel(4);
        let handle = tokio::spawn(projector.run(kick_rx));

        // Let the first tick land.
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.set(Status::Recording);
        kick_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(kick_tx);
        handle.await.unwrap();

        let shown = indicator.shown.lock().unwrap();
        assert_eq!(
            shown.as_slice(),
            &[
                (Status::Ready, LedPattern::Solid),
                (Status::Recording, LedPattern::SlowBlink),
            ]
        );
    }
}

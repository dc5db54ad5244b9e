//! Coarse lifecycle status, derived on demand — never stored.

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// What the box is doing right now, for display purposes.
///
/// Recomputed from observable state on every query: the capture loop's
/// ready flag, the active cycle's started/completed signal pair, and
/// whether the post-processing lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The capture loop has not reported ready yet.
    Initializing,
    /// Idle and armed; the pre-record buffer is rolling.
    Ready,
    /// A take is in progress.
    Recording,
    /// A finished take is being converted/uploaded.
    Processing,
}

impl Status {
    /// A short human-readable label for log lines and displays.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Initializing => "Initializing",
            Status::Ready => "Ready",
            Status::Recording => "Recording",
            Status::Processing => "Processing",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(Status::Initializing.label(), "Initializing");
        assert_eq!(Status::Ready.label(), "Ready");
        assert_eq!(Status::Recording.label(), "Recording");
        assert_eq!(Status::Processing.label(), "Processing");
    }

    #[test]
    fn status_is_copy_and_comparable() {
        let a = Status::Ready;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(Status::Ready, Status::Recording);
    }
}

//! One-shot cross-thread signals.
//!
//! A [`Gate`] is a set-once boolean backed by a condvar: writers call
//! [`open`](Gate::open) exactly once, readers either poll
//! [`is_open`](Gate::is_open) or block in [`wait`](Gate::wait). Once open a
//! gate never closes, so reads are race-free by construction — there is
//! nothing to tear.

use std::sync::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A one-shot binary signal.
///
/// Each capture cycle owns four of these (start requested, recording
/// started, stop requested, recording completed); none is ever reset — the
/// next cycle gets brand-new gates.
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Open the gate, waking all waiters. Idempotent.
    pub fn open(&self) {
        let mut open = self.open.lock().unwrap();
        if !*open {
            *open = true;
            self.cond.notify_all();
        }
    }

    /// Non-blocking poll.
    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    /// Block the calling thread until the gate opens. Returns immediately
    /// if it already has. There is deliberately no timeout — a stuck device
    /// stalls the caller (acceptable on this deployment).
    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

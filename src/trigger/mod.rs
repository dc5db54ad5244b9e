//! Button events and the trigger loop.
//!
//! The hardware driver (or the stdin stand-in) feeds raw [`ButtonEvent`]s
//! into a channel. The [`ButtonInterpreter`] folds a hold-then-release pair
//! into a long press; a bare release is a short press. [`run_triggers`]
//! drives the recorder from the resulting [`Trigger`] stream.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::session::SessionRecorder;

// ---------------------------------------------------------------------------
// Events and triggers
// ---------------------------------------------------------------------------

/// Raw event from the button driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// The button has been held past the long-press threshold.
    Held,
    /// The button was released.
    Released,
}

/// Interpreted press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Plain tap: start or stop without the pre-record buffer.
    Short,
    /// Long press: start with the pre-record buffer, or cancel the take.
    Long,
}

impl Trigger {
    pub fn is_long(self) -> bool {
        matches!(self, Trigger::Long)
    }
}

// ---------------------------------------------------------------------------
// ButtonInterpreter
// ---------------------------------------------------------------------------

/// Folds the driver's held/released pairs into [`Trigger`]s.
///
/// `Held` arms the interpreter and produces nothing; the following
/// `Released` then yields a long press. A `Released` with no preceding
/// `Held` is a short press.
#[derive(Debug, Default)]
pub struct ButtonInterpreter {
    armed: bool,
}

impl ButtonInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpret(&mut self, event: ButtonEvent) -> Option<Trigger> {
        match event {
            ButtonEvent::Held => {
                self.armed = true;
                None
            }
            ButtonEvent::Released => {
                let trigger = if self.armed {
                    Trigger::Long
                } else {
                    Trigger::Short
                };
                self.armed = false;
                Some(trigger)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger loop
// ---------------------------------------------------------------------------

/// Drive the recorder from button events until the channel closes.
///
/// Each handled trigger also kicks `refresh_tx` so the status projector
/// re-reads immediately instead of waiting out its poll interval.
pub async fn run_triggers(
    recorder: Arc<SessionRecorder>,
    mut events: mpsc::Receiver<ButtonEvent>,
    refresh_tx: mpsc::Sender<()>,
) {
    let mut interpreter = ButtonInterpreter::new();

    while let Some(event) = events.recv().await {
        let Some(trigger) = interpreter.interpret(event) else {
            continue;
        };

        log::debug!("button trigger: {trigger:?}");
        recorder.toggle(trigger.is_long()).await;

        // A full refresh channel already has a pending kick.
        let _ = refresh_tx.try_send(());
    }

    log::info!("button event channel closed - trigger loop exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_release_is_a_short_press() {
        let mut interp = ButtonInterpreter::new();
        assert_eq!(interp.interpret(ButtonEvent::Released), Some(Trigger::Short));
    }

    #[test]
    fn held_then_release_is_a_long_press() {
        let mut interp = ButtonInterpreter::new();
        assert_eq!(interp.interpret(ButtonEvent::Held), None);
        assert_eq!(interp.interpret(ButtonEvent::Released), Some(Trigger::Long));
    }

    #[test]
    fn arming_does_not_leak_into_the_next_press() {
        let mut interp = ButtonInterpreter::new();
        interp.interpret(ButtonEvent::Held);
        interp.interpret(ButtonEvent::Released);
        assert_eq!(interp.interpret(ButtonEvent::Released), Some(Trigger::Short));
    }

    #[test]
    fn repeated_held_events_stay_armed() {
        let mut interp = ButtonInterpreter::new();
        assert_eq!(interp.interpret(ButtonEvent::Held), None);
        assert_eq!(interp.interpret(ButtonEvent::Held), None);
        assert_eq!(interp.interpret(ButtonEvent::Released), Some(Trigger::Long));
    }
}

//! Control state machine
//!
//! The outward facing sequencer. It takes one message at a time off the
//! queue, hands it to the transmit machine, and once that reports back,
//! returns the finished message to the caller. This is what guarantees that
//! only one transaction is ever on the bus.

use crate::status::ResultStatus;

/// States of the control machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum CtlState {
    /// Nothing in flight
    #[default]
    Idle,
    /// A message is being serviced by the transmit machine
    Wait,
}

/// Events fed to the control machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum CtlEvent {
    /// A message was put in the queue
    Enqueued,
    /// The transmit machine finished the current message
    Done(ResultStatus),
}

/// What the bus master has to do after a control transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CtlAction {
    /// Nothing
    None,
    /// Entered `Wait`: dequeue a message and start the transmit machine
    Begin,
    /// Left `Wait`: deliver the current message with this status
    Deliver(ResultStatus),
}

#[derive(Debug, Default)]
pub(crate) struct Ctl {
    state: CtlState,
}

impl Ctl {
    pub(crate) const fn new() -> Self {
        Self {
            state: CtlState::Idle,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> CtlState {
        self.state
    }

    pub(crate) fn transition(&mut self, event: CtlEvent) -> CtlAction {
        match (self.state, event) {
            (CtlState::Idle, CtlEvent::Enqueued) => {
                self.state = CtlState::Wait;
                CtlAction::Begin
            }
            (CtlState::Wait, CtlEvent::Done(status)) => {
                self.state = CtlState::Idle;
                CtlAction::Deliver(status)
            }
            // Busy: the message waits in the queue, and is picked up once
            // the current one is delivered.
            (CtlState::Wait, CtlEvent::Enqueued) => CtlAction::None,
            (CtlState::Idle, CtlEvent::Done(_)) => {
                dali_warn!("Done while idle");
                CtlAction::None
            }
        }
    }

    /// `Begin` found the queue empty, go back to idle
    pub(crate) fn abort(&mut self) {
        self.state = CtlState::Idle;
    }
}

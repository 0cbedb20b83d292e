//! # DALI Master
//!
//! This is the bus master side of a DALI (Digital Addressable Lighting
//! Interface) bus. DALI is a slow (1200 baud), single wire, half-duplex bus
//! used to control lighting gear: ballasts, LED drivers, and so on.
//!
//! The master sends 16-bit forward frames. Some of them are queries, and
//! get answered by the addressed gear with an 8-bit backward frame.
//!
//! ## Layers
//!
//! The bus master is made of two cooperating state machines, sitting on top
//! of a "manual" transport that bit-bangs frames onto the wire:
//!
//! 1. The Control machine (CTL), which takes one message at a time off the
//!    queue, and hands it back to the caller once it is done
//! 2. The Transmit machine (XMT), which sends one frame, checks its echo,
//!    optionally waits for an answer, and enforces the settling time between
//!    frames
//!
//! Beside those, a Bus Monitor samples the idle level of the line, and marks
//! the bus as bad if it stays stuck.
//!
//! Nothing in this crate blocks. Every wait is a state plus a timer, and all
//! progress is made by feeding events into [`BusMaster::ctl_event()`] and
//! [`BusMaster::xmt_event()`]. The [`Scheduler`] trait is how the machines
//! post events to each other and arm their timer, and the
//! [`ManualTransport`] trait is how they drive the wire. The [runner] module
//! provides a ready to use async implementation based on `embassy-time`.
//!
//! ## Echo checking
//!
//! Since the bus is a single wire that everyone shares, the master hears
//! its own frames. Each frame is read back while it is sent, and compared to
//! what was meant to be sent. A mismatch means someone else was driving the
//! line at the same time, and the message fails with
//! [`ResultStatus::EchoCompare`].
//!
//! ## Answers
//!
//! Whether a frame is answered is decided from the frame itself, see
//! [`classify::classify_answer()`]. Some queries always get an answer, some
//! only get one when the answer is "yes", and queries addressed to more than
//! one device are refused, as the answers would collide.
//!
//! ## Repeats
//!
//! DALI requires configuration commands to be received twice within 100ms
//! before gear acts on them. The transmit machine does this automatically
//! for the commands that need it (see [`classify::classify_repeat()`]). A
//! repeated command still counts as one message, and produces one result.
//!
//! ## Results
//!
//! Every submitted message comes back exactly once through the result
//! channel, as a [`BusMessage`] with a [`ResultStatus`] and, for answered
//! queries, the backward frame.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod classify;
pub mod command;
pub mod ctl;
pub mod master;
pub mod message;
pub mod monitor;
pub mod runner;
pub mod status;
#[cfg(feature = "serde")]
pub mod wirehelp;
pub mod xmt;

use embassy_time::Duration;

pub use crate::{
    command::{Address, Command},
    ctl::{CtlEvent, CtlState},
    master::{BusMaster, BusStats, Config, SubmitError},
    message::BusMessage,
    monitor::BusHealth,
    status::{describe_status, ResultStatus},
    xmt::{RxFrame, XmtEvent, XmtState},
};

/// An error type for the [`ManualTransport`] trait
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum Error<E> {
    /// Some error with the underlying transport hardware
    Transport(E),
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Transport(value)
    }
}

/// A trait representing the wire side of the DALI bus
///
/// All operations only *start* something: completion is reported later by
/// posting an [`XmtEvent`] to the scheduler, typically from an interrupt.
pub trait ManualTransport {
    /// The error type of the underlying hardware
    type TransportError;

    /// Start sending `frame`. Post [`XmtEvent::TransmitDone`] once the last
    /// bit is on the wire.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Error<Self::TransportError>>;

    /// Start receiving exactly `len` bytes. Post [`XmtEvent::ReceiveDone`]
    /// with the bytes, or [`XmtEvent::ReceiveError`] if the line carried
    /// something that did not decode. Post [`XmtEvent::EdgeSeen`] on the
    /// first edge seen while receiving.
    fn receive(&mut self, len: usize) -> Result<(), Error<Self::TransportError>>;

    /// Stop a receive started with [`ManualTransport::receive()`]. Nothing
    /// may be posted for it afterwards.
    fn abort_receive(&mut self);

    /// Sample the line: is it stuck in a state where no frame can be sent?
    fn bus_fault(&mut self) -> bool;
}

/// A trait representing the cooperative scheduler the machines run on
pub trait Scheduler {
    /// Queue an event for [`BusMaster::ctl_event()`]
    fn post_ctl(&mut self, event: CtlEvent);

    /// Queue an event for [`BusMaster::xmt_event()`]
    fn post_xmt(&mut self, event: XmtEvent);

    /// Arm the transmit timer for `timeout`, or stop it with `None`.
    ///
    /// Arming replaces any earlier deadline. On expiry,
    /// [`XmtEvent::Timeout`] must be posted.
    fn xmt_timer(&mut self, timeout: Option<Duration>);

    /// Called with every finished message, just before it is delivered
    fn store_dev_status(&mut self, _msg: &BusMessage) {}
}

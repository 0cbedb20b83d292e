//! Bus Master interface
//!
//! The [BusMaster] owns the message queue, both state machines and the bus
//! health, and exposes the entry points the scheduler calls.

use core::future::poll_fn;

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::{Sender, TrySendError},
};
use embassy_time::Duration;
use heapless::Deque;

use crate::{
    command::Command,
    ctl::{Ctl, CtlAction, CtlEvent, CtlState},
    message::BusMessage,
    monitor::BusHealth,
    status::ResultStatus,
    xmt::{Env, Xmt, XmtEvent, XmtState},
    ManualTransport, Scheduler,
};

/// The default number of messages waiting to be sent
pub const QUEUE_DEPTH: usize = 8;
/// The default capacity of the result channel
pub const RESULT_DEPTH: usize = 8;
/// The default bus monitor sampling period
pub const MONITOR_PERIOD: Duration = Duration::from_millis(10);

/// Bus master configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Allow queries to group and broadcast addresses.
    ///
    /// Only useful with a single device on the bus: with more, their
    /// answers collide.
    pub debug_queries: bool,
    /// How often the bus monitor samples the line
    pub monitor_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug_queries: false,
            monitor_period: MONITOR_PERIOD,
        }
    }
}

/// An error when submitting a message
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
#[non_exhaustive]
pub enum SubmitError {
    /// The queue is full, the message was not accepted
    QueueFull(BusMessage),
}

/// Counters of bus activity
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub struct BusStats {
    /// Frames handed to the transport, including repeats
    pub frames_sent: u32,
    /// Completed messages, indexed by [`ResultStatus`] discriminant
    pub completed: [u32; ResultStatus::COUNT],
    /// Results that found the result channel full and had to be held back
    pub held: u32,
}

impl BusStats {
    /// Number of messages completed with `status`
    pub fn count(&self, status: ResultStatus) -> u32 {
        self.completed[status as usize]
    }

    /// Number of messages completed with any status
    pub fn total(&self) -> u32 {
        self.completed.iter().fold(0u32, |a, c| a.wrapping_add(*c))
    }
}

/// DALI bus master
///
/// Generic over:
///
/// * `M`: the mutex of the result channel
/// * `T`: the [ManualTransport] driving the wire
/// * `S`: the [Scheduler] that delivers events and runs the timer
/// * `Q`: the depth of the outgoing message queue
/// * `OUT`: the capacity of the result channel
///
/// All methods are expected to be called from one task context. The
/// scheduler delivers events to [`BusMaster::ctl_event()`] and
/// [`BusMaster::xmt_event()`], one at a time, in the order they were posted,
/// and calls [`BusMaster::mon_event()`] periodically.
pub struct BusMaster<
    'r,
    M: RawMutex + 'static,
    T: ManualTransport,
    S: Scheduler,
    const Q: usize = QUEUE_DEPTH,
    const OUT: usize = RESULT_DEPTH,
> {
    config: Config,
    transport: T,
    sched: S,
    results: Sender<'r, M, BusMessage, OUT>,
    queue: Deque<BusMessage, Q>,
    current: Option<BusMessage>,
    held: Option<BusMessage>,
    ctl: Ctl,
    xmt: Xmt,
    health: BusHealth,
    stats: BusStats,
}

/// Instantiation and submission
impl<'r, M, T, S, const Q: usize, const OUT: usize> BusMaster<'r, M, T, S, Q, OUT>
where
    M: RawMutex + 'static,
    T: ManualTransport,
    S: Scheduler,
{
    /// Create a new bus master
    ///
    /// Finished messages are sent to `results`.
    ///
    /// ```rust
    /// use dali_master::{BusMaster, BusMessage, Config};
    /// # use dali_master::{CtlEvent, ManualTransport, Scheduler, XmtEvent, Error};
    /// # use embassy_time::Duration;
    /// use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
    /// # struct Wire;
    /// # impl ManualTransport for Wire {
    /// #     type TransportError = ();
    /// #     fn transmit(&mut self, _: &[u8]) -> Result<(), Error<()>> { Ok(()) }
    /// #     fn receive(&mut self, _: usize) -> Result<(), Error<()>> { Ok(()) }
    /// #     fn abort_receive(&mut self) {}
    /// #     fn bus_fault(&mut self) -> bool { false }
    /// # }
    /// # struct Sched;
    /// # impl Scheduler for Sched {
    /// #     fn post_ctl(&mut self, _: CtlEvent) {}
    /// #     fn post_xmt(&mut self, _: XmtEvent) {}
    /// #     fn xmt_timer(&mut self, _: Option<Duration>) {}
    /// # }
    ///
    /// let results: Channel<NoopRawMutex, BusMessage, 8> = Channel::new();
    /// let master: BusMaster<'_, _, _, _> =
    ///     BusMaster::new(Config::default(), Wire, Sched, results.sender());
    /// ```
    pub fn new(
        config: Config,
        transport: T,
        sched: S,
        results: Sender<'r, M, BusMessage, OUT>,
    ) -> Self {
        Self {
            config,
            transport,
            sched,
            results,
            queue: Deque::new(),
            current: None,
            held: None,
            ctl: Ctl::new(),
            xmt: Xmt::new(),
            health: BusHealth::new(),
            stats: BusStats::default(),
        }
    }

    /// Queue `command` for sending.
    ///
    /// `option` is handed back unchanged with the result. The result is
    /// delivered later through the result channel, the return value only
    /// tells whether the message was accepted.
    pub fn transmit_message(&mut self, command: Command, option: u32) -> Result<(), SubmitError> {
        self.queue
            .push_back(BusMessage::new(command, option))
            .map_err(SubmitError::QueueFull)?;
        self.sched.post_ctl(CtlEvent::Enqueued);
        Ok(())
    }

    /// Is there room for another message?
    #[inline]
    pub fn can_submit(&self) -> bool {
        !self.queue.is_full()
    }

    /// Number of messages waiting, not counting the one in flight
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler entry points
impl<'r, M, T, S, const Q: usize, const OUT: usize> BusMaster<'r, M, T, S, Q, OUT>
where
    M: RawMutex + 'static,
    T: ManualTransport,
    S: Scheduler,
{
    /// Feed one event to the control machine
    ///
    /// While a finished message is held back, no new transaction starts.
    /// [`BusMaster::flush_result()`] resumes the queue once it is delivered.
    pub fn ctl_event(&mut self, event: CtlEvent) {
        if event == CtlEvent::Enqueued && self.held.is_some() {
            dali_trace!("Result held, not starting");
            return;
        }
        match self.ctl.transition(event) {
            CtlAction::None => {}
            CtlAction::Begin => self.begin(),
            CtlAction::Deliver(status) => self.deliver(status),
        }
    }

    /// Feed one event to the transmit machine
    pub fn xmt_event(&mut self, event: XmtEvent) {
        let env = Env {
            command: self.current.as_ref().map(BusMessage::command),
            bus_bad: self.health.is_bad(),
            debug: self.config.debug_queries,
        };

        let outcome = self
            .xmt
            .handle(event, &env, &mut self.transport, &mut self.sched);

        if let Some(outcome) = outcome {
            if let Some(msg) = self.current.as_mut() {
                msg.set_response(outcome.response);
                msg.set_status(outcome.status);
            }
            self.sched.post_ctl(CtlEvent::Done(outcome.status));
        }
    }

    /// Sample the line once. Call this at [`Config::monitor_period`].
    pub fn mon_event(&mut self) {
        let line_bad = self.transport.bus_fault();
        self.health.on_tick(line_bad);
    }

    fn begin(&mut self) {
        let Some(mut msg) = self.queue.pop_front() else {
            dali_trace!("Queue empty");
            self.ctl.abort();
            return;
        };
        msg.clear_response();
        self.current = Some(msg);
        self.sched.post_xmt(XmtEvent::Start);
    }

    fn deliver(&mut self, status: ResultStatus) {
        if let Some(mut msg) = self.current.take() {
            msg.set_status(status);
            self.stats.completed[status as usize] =
                self.stats.completed[status as usize].wrapping_add(1);
            self.sched.store_dev_status(&msg);

            if let Err(TrySendError::Full(msg)) = self.results.try_send(msg) {
                dali_warn!("Result channel full, holding result");
                self.stats.held = self.stats.held.wrapping_add(1);
                self.held = Some(msg);
                return;
            }
        } else {
            dali_warn!("Deliver without a message");
        }

        self.resume();
    }

    fn resume(&mut self) {
        if !self.queue.is_empty() {
            self.sched.post_ctl(CtlEvent::Enqueued);
        }
    }

    /// Retry delivering a held-back result.
    ///
    /// Returns `true` when nothing is held any more. On success the next
    /// queued message, if any, is started.
    pub fn flush_result(&mut self) -> bool {
        let Some(msg) = self.held.take() else {
            return true;
        };
        match self.results.try_send(msg) {
            Ok(()) => {
                dali_debug!("Held result delivered");
                self.resume();
                true
            }
            Err(TrySendError::Full(msg)) => {
                self.held = Some(msg);
                false
            }
        }
    }

    /// Is a finished message waiting for room in the result channel?
    #[inline]
    pub fn result_held(&self) -> bool {
        self.held.is_some()
    }

    /// Wait until the result channel has room again
    pub async fn result_room(&self) {
        poll_fn(|cx| self.results.poll_ready_to_send(cx)).await
    }
}

/// Status and access methods
impl<'r, M, T, S, const Q: usize, const OUT: usize> BusMaster<'r, M, T, S, Q, OUT>
where
    M: RawMutex + 'static,
    T: ManualTransport,
    S: Scheduler,
{
    /// Health of the bus, as seen by the monitor
    #[inline]
    pub fn health(&self) -> &BusHealth {
        &self.health
    }

    /// Activity counters
    pub fn stats(&self) -> BusStats {
        let mut stats = self.stats.clone();
        stats.frames_sent = self.xmt.frames_sent();
        stats
    }

    /// Reset all activity counters to zero
    pub fn reset_stats(&mut self) {
        self.stats = BusStats::default();
        self.xmt.reset_frames_sent();
    }

    /// The configuration given at creation
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current state of the control machine
    #[inline]
    pub fn ctl_state(&self) -> CtlState {
        self.ctl.state()
    }

    /// Current state of the transmit machine
    #[inline]
    pub fn xmt_state(&self) -> XmtState {
        self.xmt.state()
    }

    /// The scheduler, e.g. to drain its queues
    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.sched
    }

    /// The scheduler
    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.sched
    }

    /// The transport
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The transport
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

//! Async runner
//!
//! A [`Scheduler`] implementation and a task loop for running a
//! [`BusMaster`] on top of `embassy-time`.
//!
//! The transport posts its events (usually from an interrupt) into an
//! [`embassy_sync::channel::Channel`]. Applications submit messages through
//! a second channel, and get results back through the master's result
//! channel.
//!
//! ```rust,ignore
//! static EVENTS: Channel<CriticalSectionRawMutex, XmtEvent, 8> = Channel::new();
//! static REQUESTS: Channel<CriticalSectionRawMutex, Request, 8> = Channel::new();
//! static RESULTS: Channel<CriticalSectionRawMutex, BusMessage, 8> = Channel::new();
//!
//! #[embassy_executor::task]
//! async fn dali_task(wire: MyWire) {
//!     let mut master: BusMaster<'static, _, _, EventQueue<8>> = BusMaster::new(
//!         Config::default(),
//!         wire,
//!         EventQueue::new(),
//!         RESULTS.sender(),
//!     );
//!     run(&mut master, EVENTS.receiver(), REQUESTS.receiver()).await;
//! }
//! ```

use embassy_futures::select::{select4, Either4};
use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Receiver};
use embassy_time::{Duration, Instant, Ticker, Timer};
use heapless::Deque;

use crate::{
    command::Command, ctl::CtlEvent, xmt::XmtEvent, BusMaster, ManualTransport, Scheduler,
};

/// A message submission, as sent to [`run()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Request {
    /// The frame to send
    pub command: Command,
    /// Handed back unchanged in the result
    pub option: u32,
}

/// A [`Scheduler`] backed by two bounded queues and a deadline
pub struct EventQueue<const N: usize> {
    ctl: Deque<CtlEvent, N>,
    xmt: Deque<XmtEvent, N>,
    deadline: Option<Instant>,
}

impl<const N: usize> EventQueue<N> {
    /// Create a new, empty event queue
    pub const fn new() -> Self {
        Self {
            ctl: Deque::new(),
            xmt: Deque::new(),
            deadline: None,
        }
    }

    /// The next pending control event
    pub fn next_ctl(&mut self) -> Option<CtlEvent> {
        self.ctl.pop_front()
    }

    /// The next pending transmit event
    pub fn next_xmt(&mut self) -> Option<XmtEvent> {
        self.xmt.pop_front()
    }

    /// When the transmit timer expires, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm the timer, returning whether it was armed
    pub fn take_deadline(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Scheduler for EventQueue<N> {
    fn post_ctl(&mut self, event: CtlEvent) {
        if self.ctl.push_back(event).is_err() {
            dali_error!("Control queue full!");
        }
    }

    fn post_xmt(&mut self, event: XmtEvent) {
        if self.xmt.push_back(event).is_err() {
            dali_error!("Transmit queue full!");
        }
    }

    fn xmt_timer(&mut self, timeout: Option<Duration>) {
        self.deadline = timeout.map(|t| Instant::now() + t);
    }
}

/// Deliver every queued event, including the ones posted while doing so
pub fn drain<'r, M, T, const Q: usize, const OUT: usize, const N: usize>(
    master: &mut BusMaster<'r, M, T, EventQueue<N>, Q, OUT>,
) where
    M: RawMutex + 'static,
    T: ManualTransport,
{
    loop {
        if let Some(ev) = master.scheduler_mut().next_ctl() {
            master.ctl_event(ev);
        } else if let Some(ev) = master.scheduler_mut().next_xmt() {
            master.xmt_event(ev);
        } else {
            return;
        }
    }
}

/// Run the bus master forever
///
/// * `events` carries transport events
/// * `requests` carries new messages. It is only read while the master's
///   queue has room and no result is held back, so a full queue or a slow
///   result reader pushes back on the submitters.
///
/// The bus monitor is sampled every [`Config::monitor_period`][crate::Config].
pub async fn run<
    'r, 'ch, M, R, T, const Q: usize, const OUT: usize,
    const N: usize, const E: usize, const RQ: usize,
>(
    master: &mut BusMaster<'r, M, T, EventQueue<N>, Q, OUT>,
    events: Receiver<'ch, R, XmtEvent, E>,
    requests: Receiver<'ch, R, Request, RQ>,
) where
    M: RawMutex + 'static,
    R: RawMutex,
    T: ManualTransport,
{
    let mut ticker = Ticker::every(master.config().monitor_period);

    loop {
        master.flush_result();
        drain(master);

        let deadline = master.scheduler().deadline();
        let timer = async {
            match deadline {
                Some(at) => Timer::at(at).await,
                None => core::future::pending().await,
            }
        };
        let held = master.result_held();
        let can_submit = master.can_submit();
        let master_ref = &*master;
        let submit = async {
            if held {
                master_ref.result_room().await;
                None
            } else if can_submit {
                Some(requests.receive().await)
            } else {
                core::future::pending().await
            }
        };

        let woke = select4(events.receive(), timer, ticker.next(), submit).await;
        match woke {
            Either4::First(ev) => master.xmt_event(ev),
            Either4::Second(()) => {
                if master.scheduler_mut().take_deadline() {
                    master.xmt_event(XmtEvent::Timeout);
                }
            }
            Either4::Third(()) => master.mon_event(),
            // Room for the held result, delivered at the top of the loop
            Either4::Fourth(None) => {}
            Either4::Fourth(Some(req)) => {
                if let Err(_e) = master.transmit_message(req.command, req.option) {
                    // can_submit was checked above, and nothing else
                    // enqueues in between
                    dali_error!("Queue full!");
                }
            }
        }
    }
}

//! Transmit state machine
//!
//! Drives a single forward frame onto the bus:
//!
//! ```text
//!  Idle --Start--> WaitXmtDone --TransmitDone--> WaitXmtEcho --echo ok--+
//!   ^                                                                   |
//!   |          +-------------------(answer expected)--------------------+
//!   |          v                                                        |
//!   |     WaitRcvDone --ReceiveDone--> WaitBackFrameTime --Timeout--+   |
//!   |          |                                                    |   v
//!   |          +--ReceiveError------------------------------> WaitFrameTime
//!   |                                                               |
//!   +-----------------------Timeout (no repeat)---------------------+
//! ```
//!
//! DALI is a single wire bus where the master hears itself, so every frame
//! is read back and compared before it is trusted. A mismatch means some
//! other driver was active on the line at the same time.
//!
//! All waits are states plus the one transmit timer provided by the
//! [`Scheduler`]. Nothing here blocks.

use embassy_time::Duration;

use crate::{
    classify::{classify_answer, classify_repeat, AnswerExpectation},
    command::Command,
    status::ResultStatus,
    ManualTransport, Scheduler,
};

/// Length of a forward frame on the wire
pub const FORWARD_FRAME_LEN: usize = 2;
/// Length of a backward frame on the wire
pub const BACKWARD_FRAME_LEN: usize = 1;

/// Time allowed for the frame to be sent and its echo to come back
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(22);
/// Time allowed for a backward frame to arrive
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(16);
/// Settling time after a forward frame before the next frame may start
pub const FRAME_TIME: Duration = Duration::from_millis(12);
/// Settling time after a backward frame before the next frame may start
pub const BACK_FRAME_TIME: Duration = Duration::from_millis(9);

/// Bytes reported by the transport when a receive completes
pub type RxFrame = heapless::Vec<u8, FORWARD_FRAME_LEN>;

/// States of the transmit machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum XmtState {
    /// No transaction in progress
    #[default]
    Idle,
    /// Waiting for the transport to finish sending
    WaitXmtDone,
    /// Waiting for our own frame to be read back
    WaitXmtEcho,
    /// Waiting for a backward frame
    WaitRcvDone,
    /// Settling after a forward frame
    WaitFrameTime,
    /// Settling after a backward frame
    WaitBackFrameTime,
}

/// Events fed to the transmit machine
///
/// All except [`XmtEvent::Start`] and [`XmtEvent::Timeout`] come from the
/// [`ManualTransport`]. The transport must post [`XmtEvent::TransmitDone`]
/// before the [`XmtEvent::ReceiveDone`] carrying the echo of the same frame.
#[derive(Debug, Clone, PartialEq)]
pub enum XmtEvent {
    /// A message was handed over by the control machine
    Start,
    /// The transmit timer expired
    Timeout,
    /// The transport finished sending
    TransmitDone,
    /// The transport finished receiving the requested bytes
    ReceiveDone(RxFrame),
    /// The transport saw an invalid bit or frame while receiving
    ReceiveError,
    /// The transport saw an edge on the line
    EdgeSeen,
}

/// What to release when leaving a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    Nothing,
    Timer,
    Receive,
    Both,
}

/// Result of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Event ignored, no change
    Stay,
    /// Release, then enter the given state
    Goto(Release, XmtState),
    /// Release, then return to Idle, running the exit action that reports
    /// the status
    Finish(Release),
    /// Refused before touching the bus. Report the status and stay Idle
    /// without running any exit action.
    Reject,
}

/// Information about the world needed to handle `Start`
#[derive(Debug, Clone, Copy)]
pub(crate) struct Env {
    pub(crate) command: Option<Command>,
    pub(crate) bus_bad: bool,
    pub(crate) debug: bool,
}

/// The outcome of a finished transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub(crate) status: ResultStatus,
    pub(crate) response: Option<u8>,
}

/// The transmit machine and its per-transaction scratch state
#[derive(Debug)]
pub(crate) struct Xmt {
    state: XmtState,
    frame: [u8; FORWARD_FRAME_LEN],
    answer: AnswerExpectation,
    repeat: bool,
    edge_seen: bool,
    status: ResultStatus,
    response: Option<u8>,
    frames_sent: u32,
}

impl Xmt {
    pub(crate) const fn new() -> Self {
        Self {
            state: XmtState::Idle,
            frame: [0; FORWARD_FRAME_LEN],
            answer: AnswerExpectation::None,
            repeat: false,
            edge_seen: false,
            status: ResultStatus::Ok,
            response: None,
            frames_sent: 0,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> XmtState {
        self.state
    }

    /// Number of frames handed to the transport, repeats included
    #[inline]
    pub(crate) fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    pub(crate) fn reset_frames_sent(&mut self) {
        self.frames_sent = 0;
    }

    /// Feed one event, performing all resulting I/O.
    ///
    /// Returns `Some` once the transaction is over.
    pub(crate) fn handle<T, S>(
        &mut self,
        event: XmtEvent,
        env: &Env,
        transport: &mut T,
        sched: &mut S,
    ) -> Option<Outcome>
    where
        T: ManualTransport,
        S: Scheduler,
    {
        let mut step = self.transition(&event, env);

        loop {
            match step {
                Step::Stay => return None,
                Step::Reject => {
                    dali_debug!("Rejected with {}", self.status.description());
                    return Some(self.outcome());
                }
                Step::Finish(rel) => {
                    self.release(rel, transport, sched);
                    self.state = XmtState::Idle;
                    return Some(self.exit(sched));
                }
                Step::Goto(rel, next) => {
                    self.release(rel, transport, sched);
                    dali_trace!("{} -> {}", self.state, next);
                    self.state = next;
                    match self.enter(next, transport, sched) {
                        Ok(()) => return None,
                        Err(()) => {
                            dali_warn!("Transport refused to start, bus error");
                            self.status = ResultStatus::BusError;
                            step = Step::Finish(Release::Both);
                        }
                    }
                }
            }
        }
    }

    /// Decide where `event` takes us. Only touches the scratch state, all
    /// I/O happens in [`Xmt::release()`] and [`Xmt::enter()`].
    pub(crate) fn transition(&mut self, event: &XmtEvent, env: &Env) -> Step {
        use XmtEvent as E;
        use XmtState as S;

        match (self.state, event) {
            (S::Idle, E::Start) => self.start(env),

            (S::WaitXmtDone, E::TransmitDone) => Step::Goto(Release::Nothing, S::WaitXmtEcho),
            (S::WaitXmtDone, E::ReceiveError) => {
                self.status = ResultStatus::BusError;
                Step::Finish(Release::Both)
            }
            (S::WaitXmtDone, E::Timeout) => Step::Finish(Release::Receive),

            (S::WaitXmtEcho, E::ReceiveDone(echo)) => {
                if echo.as_slice() != self.frame.as_slice() {
                    dali_warn!("Echo mismatch");
                    self.status = ResultStatus::EchoCompare;
                    Step::Finish(Release::Timer)
                } else if self.answer.expects_answer() {
                    Step::Goto(Release::Timer, S::WaitRcvDone)
                } else {
                    self.status = ResultStatus::Ok;
                    Step::Goto(Release::Timer, S::WaitFrameTime)
                }
            }
            (S::WaitXmtEcho, E::ReceiveError) => {
                self.status = ResultStatus::BusError;
                Step::Finish(Release::Timer)
            }
            (S::WaitXmtEcho, E::Timeout) => Step::Finish(Release::Receive),

            (S::WaitRcvDone, E::EdgeSeen) => {
                self.edge_seen = true;
                Step::Stay
            }
            (S::WaitRcvDone, E::ReceiveDone(bytes)) => match bytes.first() {
                Some(b) => {
                    self.response = Some(*b);
                    self.status = ResultStatus::OkResponse;
                    Step::Goto(Release::Timer, S::WaitBackFrameTime)
                }
                None => self.garbled_answer(),
            },
            (S::WaitRcvDone, E::ReceiveError) => self.garbled_answer(),
            (S::WaitRcvDone, E::Timeout) => {
                self.status = if self.answer == AnswerExpectation::Required {
                    ResultStatus::RcvTimeout
                } else {
                    ResultStatus::Ok
                };
                Step::Finish(Release::Receive)
            }

            (S::WaitFrameTime, E::Timeout) => {
                if self.repeat {
                    dali_trace!("Repeating frame");
                    self.repeat = false;
                    Step::Goto(Release::Nothing, S::WaitXmtDone)
                } else {
                    Step::Finish(Release::Nothing)
                }
            }

            (S::WaitBackFrameTime, E::Timeout) => Step::Finish(Release::Nothing),

            (_state, _event) => {
                dali_trace!("Ignoring event in {}", _state);
                Step::Stay
            }
        }
    }

    fn start(&mut self, env: &Env) -> Step {
        let Some(cmd) = env.command else {
            dali_warn!("Start without a message");
            return Step::Stay;
        };

        // Fresh scratch state for every transaction
        self.frame = cmd.to_bytes();
        self.answer = AnswerExpectation::None;
        self.repeat = false;
        self.edge_seen = false;
        self.response = None;

        if env.bus_bad {
            self.status = ResultStatus::BusMonitorBad;
            return Step::Reject;
        }

        self.answer = classify_answer(&cmd, env.debug);
        if self.answer == AnswerExpectation::Error {
            self.status = ResultStatus::IllegalOp;
            return Step::Reject;
        }
        self.repeat = classify_repeat(&cmd);

        Step::Goto(Release::Nothing, XmtState::WaitXmtDone)
    }

    fn garbled_answer(&mut self) -> Step {
        self.status = if self.edge_seen {
            ResultStatus::Collision
        } else {
            ResultStatus::RcvTimeout
        };
        // Never repeat after an answer attempt, garbled or not
        self.repeat = false;
        Step::Goto(Release::Timer, XmtState::WaitFrameTime)
    }

    fn release<T: ManualTransport, S: Scheduler>(&mut self, rel: Release, transport: &mut T, sched: &mut S) {
        match rel {
            Release::Nothing => {}
            Release::Timer => sched.xmt_timer(None),
            Release::Receive => transport.abort_receive(),
            Release::Both => {
                sched.xmt_timer(None);
                transport.abort_receive();
            }
        }
    }

    /// Entry actions. Each state sets the status reported if its wait
    /// times out.
    fn enter<T: ManualTransport, S: Scheduler>(
        &mut self,
        state: XmtState,
        transport: &mut T,
        sched: &mut S,
    ) -> Result<(), ()> {
        match state {
            XmtState::Idle => {}
            XmtState::WaitXmtDone => {
                self.status = ResultStatus::XmtTimeout;
                // Listen first, so the echo of the first bit is not missed
                transport.receive(FORWARD_FRAME_LEN).map_err(drop)?;
                transport.transmit(&self.frame).map_err(drop)?;
                self.frames_sent = self.frames_sent.wrapping_add(1);
                sched.xmt_timer(Some(ECHO_TIMEOUT));
            }
            XmtState::WaitXmtEcho => {
                self.status = ResultStatus::BusError;
            }
            XmtState::WaitRcvDone => {
                self.status = ResultStatus::RcvTimeout;
                transport.receive(BACKWARD_FRAME_LEN).map_err(drop)?;
                sched.xmt_timer(Some(RESPONSE_TIMEOUT));
            }
            XmtState::WaitFrameTime => sched.xmt_timer(Some(FRAME_TIME)),
            XmtState::WaitBackFrameTime => sched.xmt_timer(Some(BACK_FRAME_TIME)),
        }
        Ok(())
    }

    /// Exit action for every regular return to Idle
    fn exit<S: Scheduler>(&mut self, sched: &mut S) -> Outcome {
        sched.xmt_timer(None);
        dali_debug!("Transaction done: {}", self.status.description());
        self.outcome()
    }

    fn outcome(&self) -> Outcome {
        Outcome {
            status: self.status,
            response: self.response,
        }
    }
}

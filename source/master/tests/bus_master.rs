use std::collections::VecDeque;

use dali_master::{
    command::opcode::{self, special},
    monitor::BUS_ERROR_THRESHOLD,
    xmt::{BACK_FRAME_TIME, ECHO_TIMEOUT, FRAME_TIME, RESPONSE_TIMEOUT},
    Address, BusMaster, BusMessage, Command, Config, CtlEvent, CtlState, Error, ManualTransport,
    ResultStatus, RxFrame, Scheduler, SubmitError, XmtEvent, XmtState,
};
use embassy_sync::{
    blocking_mutex::raw::NoopRawMutex,
    channel::{Channel, Receiver},
};
use embassy_time::Duration;

#[derive(Default)]
struct Wire {
    sent: Vec<Vec<u8>>,
    receives: Vec<usize>,
    aborts: usize,
    stuck: bool,
    refuse: bool,
}

impl ManualTransport for Wire {
    type TransportError = ();

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Error<()>> {
        if self.refuse {
            return Err(Error::Transport(()));
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<(), Error<()>> {
        self.receives.push(len);
        Ok(())
    }

    fn abort_receive(&mut self) {
        self.aborts += 1;
    }

    fn bus_fault(&mut self) -> bool {
        self.stuck
    }
}

#[derive(Default)]
struct Sched {
    ctl: VecDeque<CtlEvent>,
    xmt: VecDeque<XmtEvent>,
    timer: Option<Duration>,
    stored: usize,
}

impl Scheduler for Sched {
    fn post_ctl(&mut self, event: CtlEvent) {
        self.ctl.push_back(event);
    }

    fn post_xmt(&mut self, event: XmtEvent) {
        self.xmt.push_back(event);
    }

    fn xmt_timer(&mut self, timeout: Option<Duration>) {
        self.timer = timeout;
    }

    fn store_dev_status(&mut self, _msg: &BusMessage) {
        self.stored += 1;
    }
}

type Results = Channel<NoopRawMutex, BusMessage, 8>;
type Master<'r, const OUT: usize = 8> = BusMaster<'r, NoopRawMutex, Wire, Sched, 8, OUT>;

fn master(results: &Results, config: Config) -> Master<'_> {
    BusMaster::new(config, Wire::default(), Sched::default(), results.sender())
}

/// Deliver everything the machines posted
fn pump<const OUT: usize>(m: &mut Master<'_, OUT>) {
    loop {
        if let Some(ev) = m.scheduler_mut().ctl.pop_front() {
            m.ctl_event(ev);
        } else if let Some(ev) = m.scheduler_mut().xmt.pop_front() {
            m.xmt_event(ev);
        } else {
            return;
        }
    }
}

fn event<const OUT: usize>(m: &mut Master<'_, OUT>, ev: XmtEvent) {
    m.xmt_event(ev);
    pump(m);
}

/// Let the armed timer run out
fn expire<const OUT: usize>(m: &mut Master<'_, OUT>) {
    assert!(m.scheduler_mut().timer.take().is_some(), "no timer armed");
    event(m, XmtEvent::Timeout);
}

fn rx(bytes: &[u8]) -> XmtEvent {
    XmtEvent::ReceiveDone(RxFrame::from_slice(bytes).unwrap())
}

/// The transport finished sending, and read back `echo`
fn echo<const OUT: usize>(m: &mut Master<'_, OUT>, echo: &[u8]) {
    event(m, XmtEvent::TransmitDone);
    event(m, rx(echo));
}

fn submit(m: &mut Master<'_>, cmd: Command) {
    m.transmit_message(cmd, 0xCAFE).unwrap();
    pump(m);
}

fn result(results: &Receiver<'_, NoopRawMutex, BusMessage, 8>) -> BusMessage {
    results.try_receive().expect("no result")
}

#[test]
fn query_status_gets_answer() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(7), opcode::QUERY_STATUS);

    submit(&mut m, cmd);
    assert_eq!(m.xmt_state(), XmtState::WaitXmtDone);
    assert_eq!(m.transport().sent, vec![cmd.to_bytes().to_vec()]);
    assert_eq!(m.transport().receives, vec![2]);
    assert_eq!(m.scheduler().timer, Some(ECHO_TIMEOUT));

    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitRcvDone);
    assert_eq!(m.transport().receives, vec![2, 1]);
    assert_eq!(m.scheduler().timer, Some(RESPONSE_TIMEOUT));

    event(&mut m, rx(&[0x23]));
    assert_eq!(m.xmt_state(), XmtState::WaitBackFrameTime);
    assert_eq!(m.scheduler().timer, Some(BACK_FRAME_TIME));
    assert!(rcv.try_receive().is_err());

    expire(&mut m);
    assert_eq!(m.xmt_state(), XmtState::Idle);
    assert_eq!(m.ctl_state(), CtlState::Idle);

    let msg = result(&rcv);
    assert_eq!(msg.status(), ResultStatus::OkResponse);
    assert_eq!(msg.response(), Some(0x23));
    assert_eq!(msg.option(), 0xCAFE);
    assert_eq!(msg.command(), cmd);
    assert_eq!(m.transport().sent.len(), 1);
    assert_eq!(m.scheduler().stored, 1);
}

#[test]
fn broadcast_off_waits_frame_time() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Broadcast, opcode::OFF);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitFrameTime);
    assert_eq!(m.scheduler().timer, Some(FRAME_TIME));
    // No answer expected, so no second receive
    assert_eq!(m.transport().receives, vec![2]);

    expire(&mut m);
    let msg = result(&rcv);
    assert_eq!(msg.status(), ResultStatus::Ok);
    assert_eq!(msg.response(), None);
}

#[test]
fn stuck_bus_fails_fast() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    m.transport_mut().stuck = true;
    for _ in 0..BUS_ERROR_THRESHOLD {
        m.mon_event();
    }
    assert!(m.health().is_bad());

    for cmd in [
        Command::command(Address::Short(1), opcode::QUERY_STATUS),
        Command::command(Address::Broadcast, opcode::RECALL_MAX_LEVEL),
        Command::special(special::INITIALISE, 0),
    ] {
        submit(&mut m, cmd);
        assert_eq!(result(&rcv).status(), ResultStatus::BusMonitorBad);
    }
    assert!(m.transport().sent.is_empty());
    assert!(m.transport().receives.is_empty());
    assert_eq!(m.transport().aborts, 0);
    assert_eq!(m.scheduler().timer, None);

    m.transport_mut().stuck = false;
    m.mon_event();
    assert!(!m.health().is_bad());
    assert_eq!(m.health().error_count(), 0);
}

#[test]
fn echo_mismatch_aborts() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(3), opcode::QUERY_ACTUAL_LEVEL);

    submit(&mut m, cmd);
    let mut bad = cmd.to_bytes();
    bad[1] ^= 0x04;
    echo(&mut m, &bad);

    assert_eq!(m.xmt_state(), XmtState::Idle);
    assert_eq!(result(&rcv).status(), ResultStatus::EchoCompare);
    // Never listened for an answer
    assert_eq!(m.transport().receives, vec![2]);
    assert_eq!(m.scheduler().timer, None);
}

#[test]
fn echo_address_mismatch_aborts() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(3), opcode::RESET);

    submit(&mut m, cmd);
    let mut bad = cmd.to_bytes();
    bad[0] ^= 0x02;
    echo(&mut m, &bad);

    assert_eq!(m.xmt_state(), XmtState::Idle);
    assert_eq!(result(&rcv).status(), ResultStatus::EchoCompare);
    // A broken echo also cancels the repeat
    assert_eq!(m.transport().sent.len(), 1);
    assert_eq!(m.scheduler().timer, None);
}

#[test]
fn optional_answer_timeout_is_ok() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(3), opcode::QUERY_CONTROL_GEAR_PRESENT);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitRcvDone);
    expire(&mut m);

    let msg = result(&rcv);
    assert_eq!(msg.status(), ResultStatus::Ok);
    assert_eq!(msg.response(), None);
    assert_eq!(m.transport().aborts, 1);
}

#[test]
fn required_answer_timeout_fails() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::special(special::QUERY_SHORT_ADDRESS, 0);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    expire(&mut m);

    assert_eq!(result(&rcv).status(), ResultStatus::RcvTimeout);
}

#[test]
fn config_command_sent_twice() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(12), opcode::SET_FADE_TIME);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitFrameTime);
    assert_eq!(m.transport().sent.len(), 1);

    expire(&mut m);
    assert_eq!(m.xmt_state(), XmtState::WaitXmtDone);
    assert_eq!(m.transport().sent.len(), 2);
    assert!(rcv.try_receive().is_err());

    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitFrameTime);
    expire(&mut m);

    let sent = &m.transport().sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(result(&rcv).status(), ResultStatus::Ok);
    assert_eq!(m.stats().frames_sent, 2);
    assert_eq!(m.stats().total(), 1);
}

#[test]
fn randomise_repeats_only_with_zero_data() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    let cmd = Command::special(special::RANDOMISE, 1);
    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    expire(&mut m);
    assert_eq!(result(&rcv).status(), ResultStatus::Ok);
    assert_eq!(m.transport().sent.len(), 1);
}

#[test]
fn garbled_answer_with_edges_is_collision() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(0), opcode::QUERY_STATUS);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    event(&mut m, XmtEvent::EdgeSeen);
    event(&mut m, XmtEvent::ReceiveError);
    assert_eq!(m.xmt_state(), XmtState::WaitFrameTime);
    expire(&mut m);

    assert_eq!(result(&rcv).status(), ResultStatus::Collision);
}

#[test]
fn garbled_answer_without_edges_is_timeout() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let cmd = Command::special(special::COMPARE, 0);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    event(&mut m, XmtEvent::ReceiveError);
    expire(&mut m);

    assert_eq!(result(&rcv).status(), ResultStatus::RcvTimeout);
}

#[test]
fn group_query_is_illegal() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    submit(&mut m, Command::command(Address::Group(4), opcode::QUERY_STATUS));
    assert_eq!(result(&rcv).status(), ResultStatus::IllegalOp);
    assert!(m.transport().sent.is_empty());
    assert_eq!(m.ctl_state(), CtlState::Idle);
}

#[test]
fn group_query_allowed_in_debug() {
    let results = Results::new();
    let rcv = results.receiver();
    let config = Config {
        debug_queries: true,
        ..Config::default()
    };
    let mut m = master(&results, config);
    let cmd = Command::command(Address::Group(4), opcode::QUERY_STATUS);

    submit(&mut m, cmd);
    echo(&mut m, &cmd.to_bytes());
    assert_eq!(m.xmt_state(), XmtState::WaitRcvDone);
    event(&mut m, rx(&[0x00]));
    expire(&mut m);
    assert_eq!(result(&rcv).status(), ResultStatus::OkResponse);
}

#[test]
fn transmit_never_completes() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    submit(&mut m, Command::command(Address::Short(1), opcode::OFF));
    expire(&mut m);
    assert_eq!(result(&rcv).status(), ResultStatus::XmtTimeout);
    assert_eq!(m.transport().aborts, 1);
}

#[test]
fn echo_never_arrives() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    submit(&mut m, Command::command(Address::Short(1), opcode::OFF));
    event(&mut m, XmtEvent::TransmitDone);
    expire(&mut m);
    assert_eq!(result(&rcv).status(), ResultStatus::BusError);
}

#[test]
fn contention_while_sending() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    submit(&mut m, Command::command(Address::Short(1), opcode::OFF));
    event(&mut m, XmtEvent::ReceiveError);
    assert_eq!(result(&rcv).status(), ResultStatus::BusError);
    assert_eq!(m.scheduler().timer, None);
}

#[test]
fn refused_transmit_is_bus_error() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    m.transport_mut().refuse = true;

    submit(&mut m, Command::command(Address::Short(1), opcode::OFF));
    assert_eq!(result(&rcv).status(), ResultStatus::BusError);
    assert_eq!(m.xmt_state(), XmtState::Idle);
    assert_eq!(m.ctl_state(), CtlState::Idle);
}

#[test]
fn queued_messages_run_one_at_a_time() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());
    let first = Command::command(Address::Short(1), opcode::OFF);
    let second = Command::command(Address::Short(2), opcode::RECALL_MAX_LEVEL);

    m.transmit_message(first, 1).unwrap();
    m.transmit_message(second, 2).unwrap();
    pump(&mut m);

    // Only the first one is on the bus
    assert_eq!(m.transport().sent.len(), 1);
    assert_eq!(m.queued(), 1);

    echo(&mut m, &first.to_bytes());
    expire(&mut m);
    assert_eq!(result(&rcv).option(), 1);

    // The second one started on its own
    assert_eq!(m.transport().sent.len(), 2);
    assert_eq!(m.transport().sent[1], second.to_bytes().to_vec());
    echo(&mut m, &second.to_bytes());
    expire(&mut m);
    assert_eq!(result(&rcv).option(), 2);
    assert_eq!(m.queued(), 0);
}

#[test]
fn full_queue_refuses() {
    let results = Results::new();
    let mut m = master(&results, Config::default());
    let cmd = Command::command(Address::Short(1), opcode::OFF);

    for i in 0..8 {
        m.transmit_message(cmd, i).unwrap();
    }
    assert!(!m.can_submit());
    assert_eq!(
        m.transmit_message(cmd, 8),
        Err(SubmitError::QueueFull(BusMessage::new(cmd, 8)))
    );
}

#[test]
fn stats_count_statuses() {
    let results = Results::new();
    let rcv = results.receiver();
    let mut m = master(&results, Config::default());

    submit(&mut m, Command::command(Address::Group(1), opcode::QUERY_STATUS));
    submit(&mut m, Command::command(Address::Broadcast, opcode::QUERY_LAMP_FAILURE));
    let _ = result(&rcv);
    let _ = result(&rcv);

    let stats = m.stats();
    assert_eq!(stats.count(ResultStatus::IllegalOp), 2);
    assert_eq!(stats.frames_sent, 0);

    m.reset_stats();
    assert_eq!(m.stats().total(), 0);
}

/// Send a broadcast OFF through the whole cycle
fn send_off<const OUT: usize>(m: &mut Master<'_, OUT>, option: u32) {
    let cmd = Command::command(Address::Broadcast, opcode::OFF);
    m.transmit_message(cmd, option).unwrap();
    pump(m);
    echo(m, &cmd.to_bytes());
    expire(m);
}

#[test]
fn full_result_channel_holds_result() {
    let results: Channel<NoopRawMutex, BusMessage, 1> = Channel::new();
    let rcv = results.receiver();
    let mut m: Master<'_, 1> =
        BusMaster::new(Config::default(), Wire::default(), Sched::default(), results.sender());

    send_off(&mut m, 1);
    send_off(&mut m, 2);
    assert!(m.result_held());
    assert_eq!(m.stats().held, 1);

    // Nothing new starts while a result is held
    let cmd = Command::command(Address::Broadcast, opcode::OFF);
    m.transmit_message(cmd, 3).unwrap();
    pump(&mut m);
    assert_eq!(m.ctl_state(), CtlState::Idle);
    assert_eq!(m.xmt_state(), XmtState::Idle);
    assert_eq!(m.transport().sent.len(), 2);
    assert!(!m.flush_result());

    assert_eq!(rcv.try_receive().unwrap().option(), 1);
    assert!(m.flush_result());
    assert!(!m.result_held());
    pump(&mut m);

    // The queued message went out once the result was taken
    assert_eq!(m.xmt_state(), XmtState::WaitXmtDone);
    assert_eq!(m.transport().sent.len(), 3);
    assert_eq!(rcv.try_receive().unwrap().option(), 2);

    echo(&mut m, &cmd.to_bytes());
    expire(&mut m);
    assert_eq!(rcv.try_receive().unwrap().option(), 3);
    assert!(rcv.try_receive().is_err());
    assert_eq!(m.stats().total(), 3);
}

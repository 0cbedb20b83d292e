//! Answer and repeat classification
//!
//! Before a frame goes out, the bus master needs to know two things about
//! it:
//!
//! 1. Will a backward frame come back, and does it have to?
//! 2. Is this a configuration command that DALI requires to be sent twice
//!    within 100ms to take effect?
//!
//! Both answers only depend on the frame itself (and on whether group
//! queries are allowed), so they are plain functions.

use crate::command::{
    opcode::{self, special},
    Command,
};

/// Whether a backward frame is expected for a forward frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum AnswerExpectation {
    /// No backward frame will be sent
    None,
    /// Gear answers YES with a backward frame, and NO with silence
    Maybe,
    /// A backward frame is mandatory, silence is a failure
    Required,
    /// A query was sent to more than one device. Their answers would
    /// collide on the bus, so the frame must not be sent.
    Error,
}

impl AnswerExpectation {
    /// Should we listen for a backward frame?
    #[inline]
    pub const fn expects_answer(&self) -> bool {
        matches!(self, AnswerExpectation::Maybe | AnswerExpectation::Required)
    }
}

/// Queries where every addressed device must answer
const fn is_required_query(op: u8) -> bool {
    matches!(
        op,
        opcode::QUERY_STATUS
            | opcode::QUERY_VERSION_NUMBER..=opcode::QUERY_PHYSICAL_MINIMUM
            | opcode::QUERY_CONTENT_DTR1..=opcode::QUERY_CONTENT_DTR2
            | opcode::QUERY_ACTUAL_LEVEL..=opcode::QUERY_FADE_TIME_RATE
            | opcode::QUERY_SCENE_LEVEL..=opcode::READ_MEMORY_LOCATION
            | opcode::QUERY_GEAR_TYPE..=opcode::QUERY_EXTENDED_VERSION_NUMBER
    )
}

/// YES/NO queries, where NO is answered with silence
const fn is_yes_no_query(op: u8) -> bool {
    matches!(
        op,
        opcode::QUERY_CONTROL_GEAR_PRESENT..=opcode::QUERY_MISSING_SHORT_ADDRESS
            | opcode::QUERY_POWER_FAILURE
    )
}

/// Configuration commands that must be sent twice
const fn is_config_command(op: u8) -> bool {
    matches!(
        op,
        opcode::RESET..=opcode::ENABLE_WRITE_MEMORY
            | opcode::REFERENCE_SYSTEM_POWER..=opcode::SELECT_DIMMING_CURVE
    )
}

/// Decide whether `cmd` will be answered with a backward frame.
///
/// Queries sent to a group or broadcast address are classified as
/// [`AnswerExpectation::Error`] unless `debug` is set, in which case they
/// are treated like individually addressed queries. This is useful when
/// bringing up a bus with a single device on it.
pub const fn classify_answer(cmd: &Command, debug: bool) -> AnswerExpectation {
    // Direct arc power frames are never answered
    if !cmd.selector() {
        return AnswerExpectation::None;
    }

    if cmd.is_special() {
        return match (cmd.opcode(), cmd.data()) {
            (special::COMPARE, 0) => AnswerExpectation::Maybe,
            (special::WRITE_MEMORY_LOCATION, _) => AnswerExpectation::Maybe,
            (special::QUERY_SHORT_ADDRESS, 0) => AnswerExpectation::Required,
            (special::VERIFY_SHORT_ADDRESS, _) => AnswerExpectation::Required,
            (
                special::INITIALISE
                | special::RANDOMISE
                | special::WITHDRAW
                | special::SEARCHADDRH
                | special::SEARCHADDRM
                | special::SEARCHADDRL
                | special::PROGRAM_SHORT_ADDRESS
                | special::ENABLE_DEVICE_TYPE
                | special::DTR0
                | special::DTR1
                | special::DTR2,
                _,
            ) => AnswerExpectation::None,
            _ => AnswerExpectation::None,
        };
    }

    let op = cmd.opcode();
    let multi_ok = cmd.is_individual() || debug;

    if is_required_query(op) {
        if multi_ok {
            AnswerExpectation::Required
        } else {
            AnswerExpectation::Error
        }
    } else if is_yes_no_query(op) {
        if multi_ok {
            AnswerExpectation::Maybe
        } else {
            AnswerExpectation::Error
        }
    } else {
        AnswerExpectation::None
    }
}

/// Decide whether `cmd` falls under the DALI "send twice" rule.
pub const fn classify_repeat(cmd: &Command) -> bool {
    if cmd.is_special() {
        return match (cmd.opcode(), cmd.data()) {
            (special::INITIALISE, _) => true,
            (special::RANDOMISE, 0) => true,
            _ => false,
        };
    }

    // Group addressed configuration commands are NOT repeated here, only
    // the broadcast command address and short addresses.
    let to_repeat_dest = cmd.addr_byte() == Command::BROADCAST_COMMAND
        || (cmd.selector() && cmd.is_individual());

    to_repeat_dest && is_config_command(cmd.opcode())
}

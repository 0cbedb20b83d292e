//! Messages submitted to the bus master

use crate::{command::Command, status::ResultStatus};

/// One unit of work for the bus master
///
/// Created by [`BusMaster::transmit_message()`][crate::BusMaster::transmit_message],
/// held in the queue until the control machine picks it up, and handed back
/// to the caller through the result channel once it has a final status.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusMessage {
    command: Command,
    option: u32,
    response: Option<u8>,
    status: ResultStatus,
}

impl BusMessage {
    /// Create a new, unsent message
    ///
    /// `option` is not interpreted, it is handed back with the result so the
    /// caller can match results to requests.
    pub const fn new(command: Command, option: u32) -> Self {
        Self {
            command,
            option,
            response: None,
            status: ResultStatus::Ok,
        }
    }

    /// The forward frame
    #[inline]
    pub fn command(&self) -> Command {
        self.command
    }

    /// The caller's option value
    #[inline]
    pub fn option(&self) -> u32 {
        self.option
    }

    /// The backward frame, if one was received
    #[inline]
    pub fn response(&self) -> Option<u8> {
        self.response
    }

    /// The final status. Only meaningful once the message was returned.
    #[inline]
    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub(crate) fn clear_response(&mut self) {
        self.response = None;
    }

    pub(crate) fn set_response(&mut self, response: Option<u8>) {
        self.response = response;
    }

    pub(crate) fn set_status(&mut self, status: ResultStatus) {
        self.status = status;
    }
}

//! Wire data format helper functions
//!
//! A bridge (e.g. a USB dongle) forwarding DALI traffic to a host needs to
//! put requests and results on some other link. These helpers use
//! [postcard] for that.

use crate::{message::BusMessage, runner::Request};

/// Serialize a finished message into `buf`, returning the used part
pub fn encode_message<'a>(msg: &BusMessage, buf: &'a mut [u8]) -> Option<&'a mut [u8]> {
    postcard::to_slice(msg, buf).ok()
}

/// Deserialize a finished message
pub fn decode_message(buf: &[u8]) -> Option<BusMessage> {
    postcard::from_bytes(buf).ok()
}

/// Serialize a request into `buf`, returning the used part
pub fn encode_request<'a>(req: &Request, buf: &'a mut [u8]) -> Option<&'a mut [u8]> {
    postcard::to_slice(req, buf).ok()
}

/// Deserialize a request, e.g. one received from the host
pub fn decode_request(buf: &[u8]) -> Option<Request> {
    postcard::from_bytes(buf).ok()
}

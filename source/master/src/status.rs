//! Result status of a bus transaction

/// The final outcome of one submitted message
///
/// Exactly one status is attached to every message handed back to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResultStatus {
    /// Sent, and no answer was (or had to be) received
    #[default]
    Ok = 0,
    /// Sent, and a backward frame was received
    OkResponse = 1,
    /// A backward frame was received with a framing error
    ReceiveError = 2,
    /// The transport never reported the frame as sent
    XmtTimeout = 3,
    /// The bus was disturbed while sending, or the echo never arrived
    BusError = 4,
    /// The echo did not match what we sent
    EchoCompare = 5,
    /// A mandatory backward frame did not arrive
    RcvTimeout = 6,
    /// More than one device answered at the same time
    Collision = 7,
    /// A query was addressed to more than one device
    IllegalOp = 8,
    /// The bus monitor considers the bus unusable
    BusMonitorBad = 9,
}

/// Returned for raw status values that do not map to a [`ResultStatus`]
pub const UNKNOWN_DESCRIPTION: &str = "UNKNOWN";

const DESCRIPTIONS: [&str; ResultStatus::COUNT] = [
    "XMTOK",
    "XMTOKRCVOK",
    "RCVERR",
    "XMTTMO",
    "BUSERR",
    "ECHOERR",
    "RCVTMO",
    "BUSCOL",
    "ILLOP",
    "BUSMONBAD",
];

impl ResultStatus {
    /// Number of distinct statuses
    pub const COUNT: usize = 10;

    /// All statuses, in discriminant order
    pub const ALL: [ResultStatus; Self::COUNT] = [
        ResultStatus::Ok,
        ResultStatus::OkResponse,
        ResultStatus::ReceiveError,
        ResultStatus::XmtTimeout,
        ResultStatus::BusError,
        ResultStatus::EchoCompare,
        ResultStatus::RcvTimeout,
        ResultStatus::Collision,
        ResultStatus::IllegalOp,
        ResultStatus::BusMonitorBad,
    ];

    /// A short mnemonic for this status, e.g. `"BUSCOL"`
    pub const fn description(&self) -> &'static str {
        DESCRIPTIONS[*self as usize]
    }

    /// Did the frame make it onto the bus intact?
    pub const fn is_ok(&self) -> bool {
        matches!(self, ResultStatus::Ok | ResultStatus::OkResponse)
    }
}

impl TryFrom<u8> for ResultStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ResultStatus::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(value)
    }
}

impl From<ResultStatus> for u8 {
    fn from(val: ResultStatus) -> Self {
        val as u8
    }
}

/// Describe a raw status value, see [`ResultStatus::description`]
pub fn describe_status(raw: u8) -> &'static str {
    ResultStatus::try_from(raw)
        .map(|s| s.description())
        .unwrap_or(UNKNOWN_DESCRIPTION)
}

//! DALI forward frames
//!
//! A forward frame is 16 bits on the wire: one address byte followed by one
//! data byte. The address byte looks like this:
//!
//! | Pattern     | Meaning                                 |
//! | :---------- | :-------------------------------------- |
//! | `0AAAAAAS`  | Short address `0..=63`                  |
//! | `100GGGGS`  | Group address `0..=15`                  |
//! | `101CCCC1`  | Special command                         |
//! | `110CCCC1`  | Special command                         |
//! | `11111101`  | Broadcast to unaddressed gear           |
//! | `1111111S`  | Broadcast                               |
//!
//! The `S` (selector) bit picks between a direct arc power level (`0`) and
//! a command (`1`). For special commands the whole address byte *is* the
//! opcode, and the data byte is a parameter.

/// Opcodes of the DALI command set used by this crate.
///
/// Standard commands are sent in the data byte, after an address byte with
/// the selector bit set. Special commands (`special::*`) are sent in the
/// address byte.
pub mod opcode {
    /// Extinguish the lamp without fading
    pub const OFF: u8 = 0x00;
    /// Recall the maximum level
    pub const RECALL_MAX_LEVEL: u8 = 0x05;
    /// Recall the minimum level
    pub const RECALL_MIN_LEVEL: u8 = 0x06;
    /// First "go to scene" command, `GO_TO_SCENE + n` for scene `n`
    pub const GO_TO_SCENE: u8 = 0x10;

    /// First configuration command
    pub const RESET: u8 = 0x20;
    /// Store the actual level in DTR0
    pub const STORE_ACTUAL_LEVEL_IN_DTR0: u8 = 0x21;
    /// Set the maximum level from DTR0
    pub const SET_MAX_LEVEL: u8 = 0x2A;
    /// Set the minimum level from DTR0
    pub const SET_MIN_LEVEL: u8 = 0x2B;
    /// Set the fade time from DTR0
    pub const SET_FADE_TIME: u8 = 0x2E;
    /// First "set scene" command, `SET_SCENE + n` for scene `n`
    pub const SET_SCENE: u8 = 0x40;
    /// First "add to group" command, `ADD_TO_GROUP + n` for group `n`
    pub const ADD_TO_GROUP: u8 = 0x60;
    /// Set the short address from DTR0
    pub const SET_SHORT_ADDRESS: u8 = 0x80;
    /// Last configuration command
    pub const ENABLE_WRITE_MEMORY: u8 = 0x81;

    /// Query the status byte
    pub const QUERY_STATUS: u8 = 0x90;
    /// Is control gear present?
    pub const QUERY_CONTROL_GEAR_PRESENT: u8 = 0x91;
    /// Lamp failure?
    pub const QUERY_LAMP_FAILURE: u8 = 0x92;
    /// Lamp power on?
    pub const QUERY_LAMP_POWER_ON: u8 = 0x93;
    /// Limit error?
    pub const QUERY_LIMIT_ERROR: u8 = 0x94;
    /// Reset state?
    pub const QUERY_RESET_STATE: u8 = 0x95;
    /// Missing short address?
    pub const QUERY_MISSING_SHORT_ADDRESS: u8 = 0x96;
    /// Query the version number
    pub const QUERY_VERSION_NUMBER: u8 = 0x97;
    /// Query the content of DTR0
    pub const QUERY_CONTENT_DTR0: u8 = 0x98;
    /// Query the device type
    pub const QUERY_DEVICE_TYPE: u8 = 0x99;
    /// Query the physical minimum level
    pub const QUERY_PHYSICAL_MINIMUM: u8 = 0x9A;
    /// Power failure?
    pub const QUERY_POWER_FAILURE: u8 = 0x9B;
    /// Query the content of DTR1
    pub const QUERY_CONTENT_DTR1: u8 = 0x9C;
    /// Query the content of DTR2
    pub const QUERY_CONTENT_DTR2: u8 = 0x9D;
    /// Query the actual arc power level
    pub const QUERY_ACTUAL_LEVEL: u8 = 0xA0;
    /// Query the maximum level
    pub const QUERY_MAX_LEVEL: u8 = 0xA1;
    /// Query the minimum level
    pub const QUERY_MIN_LEVEL: u8 = 0xA2;
    /// Query the fade time and fade rate
    pub const QUERY_FADE_TIME_RATE: u8 = 0xA5;
    /// First "query scene level" command
    pub const QUERY_SCENE_LEVEL: u8 = 0xB0;
    /// Query group membership, groups 0..=7
    pub const QUERY_GROUPS_0_7: u8 = 0xC0;
    /// Read the memory location addressed by DTR0/DTR1
    pub const READ_MEMORY_LOCATION: u8 = 0xC5;

    /// Device type 6: reference system power
    pub const REFERENCE_SYSTEM_POWER: u8 = 0xE0;
    /// Device type 6: select dimming curve
    pub const SELECT_DIMMING_CURVE: u8 = 0xE3;
    /// Device type 6: query gear type
    pub const QUERY_GEAR_TYPE: u8 = 0xED;
    /// Query the extended version number of the enabled device type
    pub const QUERY_EXTENDED_VERSION_NUMBER: u8 = 0xFF;

    /// Special commands, sent in the address byte
    pub mod special {
        /// Terminate special processes
        pub const TERMINATE: u8 = 0xA1;
        /// Write DTR0
        pub const DTR0: u8 = 0xA3;
        /// Enter initialisation state
        pub const INITIALISE: u8 = 0xA5;
        /// Generate a new random address
        pub const RANDOMISE: u8 = 0xA7;
        /// Compare the random address against the search address
        pub const COMPARE: u8 = 0xA9;
        /// Withdraw from the compare process
        pub const WITHDRAW: u8 = 0xAB;
        /// Set the high byte of the search address
        pub const SEARCHADDRH: u8 = 0xB1;
        /// Set the middle byte of the search address
        pub const SEARCHADDRM: u8 = 0xB3;
        /// Set the low byte of the search address
        pub const SEARCHADDRL: u8 = 0xB5;
        /// Program the short address of the selected device
        pub const PROGRAM_SHORT_ADDRESS: u8 = 0xB7;
        /// Verify the short address of the selected device
        pub const VERIFY_SHORT_ADDRESS: u8 = 0xB9;
        /// Query the short address of the selected device
        pub const QUERY_SHORT_ADDRESS: u8 = 0xBB;
        /// Enable the application extended commands of a device type
        pub const ENABLE_DEVICE_TYPE: u8 = 0xC1;
        /// Write DTR1
        pub const DTR1: u8 = 0xC3;
        /// Write DTR2
        pub const DTR2: u8 = 0xC5;
        /// Write a memory location, with answer
        pub const WRITE_MEMORY_LOCATION: u8 = 0xC7;
    }
}

/// The decoded destination of a forward frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
pub enum Address {
    /// One device, `0..=63`
    Short(u8),
    /// One group, `0..=15`
    Group(u8),
    /// All devices
    Broadcast,
    /// All devices without a short address
    BroadcastUnaddressed,
    /// Not an address: a special command, carrying its opcode
    Special(u8),
}

/// A 16-bit DALI forward frame
///
/// Built by the caller, then only read by the classifier and the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-logging", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    addr: u8,
    data: u8,
}

impl Command {
    const SELECTOR: u8 = 0b0000_0001;
    const GROUP_MASK: u8 = 0b1110_0000;
    const GROUP_PATTERN: u8 = 0b1000_0000;
    const SPECIAL_LOW: u8 = 0b1010_0000;
    const SPECIAL_HIGH: u8 = 0b1100_1111;

    /// The broadcast address with the selector bit set
    pub const BROADCAST_COMMAND: u8 = 0xFF;
    /// The broadcast address with the selector bit clear
    pub const BROADCAST_ARC: u8 = 0xFE;
    /// Broadcast to devices that have no short address
    pub const BROADCAST_UNADDRESSED: u8 = 0xFD;

    /// Build a frame from the raw address and data bytes
    pub const fn from_raw(addr: u8, data: u8) -> Self {
        Self { addr, data }
    }

    /// Set the arc power level of `addr` directly
    pub const fn arc_power(addr: Address, level: u8) -> Self {
        Self {
            addr: addr.to_byte(),
            data: level,
        }
    }

    /// Send the standard command `opcode` to `addr`
    pub const fn command(addr: Address, opcode: u8) -> Self {
        Self {
            addr: addr.to_byte() | Self::SELECTOR,
            data: opcode,
        }
    }

    /// Send the special command `opcode` with parameter `data`
    pub const fn special(opcode: u8, data: u8) -> Self {
        Self { addr: opcode, data }
    }

    /// The raw address byte
    #[inline]
    pub const fn addr_byte(&self) -> u8 {
        self.addr
    }

    /// The data byte. This is the opcode for addressed commands, the arc
    /// level for direct arc power frames, and the parameter for special
    /// commands.
    #[inline]
    pub const fn data(&self) -> u8 {
        self.data
    }

    /// Is the selector bit set, e.g. is this a command rather than a
    /// direct arc power level?
    #[inline]
    pub const fn selector(&self) -> bool {
        (self.addr & Self::SELECTOR) != 0
    }

    /// Is this one of the special commands?
    #[inline]
    pub const fn is_special(&self) -> bool {
        self.addr >= Self::SPECIAL_LOW && self.addr <= Self::SPECIAL_HIGH && self.selector()
    }

    /// Is this frame sent to exactly one short address?
    #[inline]
    pub const fn is_individual(&self) -> bool {
        (self.addr & 0b1000_0000) == 0
    }

    /// The opcode: the address byte for special commands, the data byte
    /// otherwise.
    #[inline]
    pub const fn opcode(&self) -> u8 {
        if self.is_special() {
            self.addr
        } else {
            self.data
        }
    }

    /// Decode the destination of this frame
    pub const fn address(&self) -> Address {
        let a = self.addr;
        if self.is_individual() {
            Address::Short(a >> 1)
        } else if (a & Self::GROUP_MASK) == Self::GROUP_PATTERN {
            Address::Group((a >> 1) & 0x0F)
        } else if self.is_special() {
            Address::Special(a)
        } else if a == Self::BROADCAST_UNADDRESSED {
            Address::BroadcastUnaddressed
        } else {
            // 0xFE, 0xFF, and the reserved patterns between the special
            // commands and broadcast, which gear treats as broadcast.
            Address::Broadcast
        }
    }

    /// The frame as sent on the wire, address byte first
    #[inline]
    pub const fn to_bytes(&self) -> [u8; 2] {
        [self.addr, self.data]
    }
}

impl From<[u8; 2]> for Command {
    fn from(value: [u8; 2]) -> Self {
        Self::from_raw(value[0], value[1])
    }
}

impl From<Command> for [u8; 2] {
    fn from(val: Command) -> Self {
        val.to_bytes()
    }
}

impl Address {
    /// The address byte with the selector bit clear
    ///
    /// Out of range short and group numbers are masked.
    pub const fn to_byte(&self) -> u8 {
        match *self {
            Address::Short(a) => (a & 0b0011_1111) << 1,
            Address::Group(g) => Command::GROUP_PATTERN | ((g & 0b0000_1111) << 1),
            Address::Broadcast => Command::BROADCAST_ARC,
            Address::BroadcastUnaddressed => Command::BROADCAST_UNADDRESSED,
            Address::Special(op) => op,
        }
    }
}

//! Wire-format tags shared by request commands and response fields
//! (§6 External interfaces).

pub const FIRMWARE_VERSION: u8 = 0x01;
pub const CLOCK10U: u8 = 0x02;
pub const MCUSR: u8 = 0x03;
pub const ERRORN: u8 = 0x08;
pub const ERROR2: u8 = 0x09;
pub const MDB_RESULT: u8 = 0x10;
pub const MDB_DATA: u8 = 0x11;
pub const MDB_DURATION10U: u8 = 0x12;
pub const TWI_ADDR: u8 = 0x20;
pub const TWI_DATA: u8 = 0x21;

pub mod response_header {
    pub const OK: u8 = 0x01;
    pub const RESET: u8 = 0x02;
    pub const TWI_LISTEN: u8 = 0x03;
    pub const ERROR: u8 = 0x80;
}

pub mod error_code {
    pub const FRAME_HEADER: u8 = 0x01;
    /// Spec.md gives `FRAME_LENGTH` and `INVALID_CRC` the same numeric
    /// value (0x02); kept as written rather than "fixed", since the
    /// wire value is what a host decoder actually matches on.
    pub const FRAME_LENGTH: u8 = 0x02;
    pub const INVALID_CRC: u8 = 0x02;
    pub const REQUEST_OVERWRITE: u8 = 0x03;
    pub const INVALID_ACK: u8 = 0x04;
    pub const BUFFER_OVERFLOW: u8 = 0x05;
    pub const UNKNOWN_COMMAND: u8 = 0x10;
    pub const INVALID_DATA: u8 = 0x11;
    pub const NOT_IMPLEMENTED: u8 = 0x12;
    pub const INVALID_ID: u8 = FRAME_HEADER;
}

pub mod command {
    pub const STATUS: u8 = 0x01;
    pub const CONFIG: u8 = 0x02;
    pub const RESET: u8 = 0x03;
    pub const DEBUG: u8 = 0x04;
    pub const FLASH: u8 = 0x05;
    pub const MDB_BUS_RESET: u8 = 0x07;
    pub const MDB_TRANSACTION_SIMPLE: u8 = 0x08;
    pub const MDB_TRANSACTION_CUSTOM: u8 = 0x09;
}

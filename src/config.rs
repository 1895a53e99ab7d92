//! Board/protocol constants (§6, §7, §9 "No dynamic allocation").
//!
//! Every buffer in this crate is sized from one of these at compile
//! time; nothing here is read from flash or EEPROM at runtime.

/// Secondary-bus slave address (§1, §4.7).
pub const TWI_ADDRESS: u8 = 0x78;

/// MDB auxiliary UART baud rate (§4.4).
pub const MDB_BAUD: u32 = 9600;

/// Free-running tick period, in microseconds (§4.3).
pub const TICK_US: u16 = 10;

/// MDB per-byte deadline (§4.5, §8 scenario 6).
pub const MDB_BYTE_TIMEOUT_MS: u16 = 6;

/// Watchdog period; a missed main-loop iteration past this triggers a
/// hardware reset (§5 "Blocking").
pub const WATCHDOG_PERIOD_MS: u16 = 30;

/// Host frame cap, both directions (§6, §9).
pub const HOST_FRAME_MAX: usize = crate::host::packet::HOST_FRAME_MAX;

/// MDB on-wire frame cap, payload + checksum (§3, §9).
pub const MDB_FRAME_MAX: usize = crate::mdb::engine::MDB_OUT_MAX;

/// Placeholder firmware version reported in `FIELD_FIRMWARE_VERSION`;
/// board-specific per spec's open question, left uninterpreted here.
pub const FIRMWARE_VERSION: (u8, u8) = (0, 1);

/// Capacity of the deferred debug-log ring (§10/§13 ambient logging).
pub const LOG_BUFFER_SIZE: usize = 128;

//! MDB session result codes (§4.5, §8). Placed in `FIELD_MDB_RESULT[0]`,
//! with an optional diagnostic byte in `[1]`.
//!
//! The numeric codes below are not specified by the wire protocol
//! (spec.md only names the result set, not byte values) — sequential
//! assignment in listed order is an implementation decision, recorded
//! in DESIGN.md, not a guess at an external fixed vector.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdbResult {
    Success,
    Busy(u8),
    InvalidChk,
    Nak,
    Timeout(u8),
    InvalidEnd(u8),
    ReceiveOverflow,
    SendOverflow,
    CodeError,
    UartReadUnexpected(u8),
    UartReadError,
    UartReadOverflow,
    UartReadParity,
    UartSendBusy,
    UartTxcUnexpected,
    TimerCodeError,
}

impl MdbResult {
    pub const fn code(self) -> u8 {
        match self {
            MdbResult::Success => 0,
            MdbResult::Busy(_) => 1,
            MdbResult::InvalidChk => 2,
            MdbResult::Nak => 3,
            MdbResult::Timeout(_) => 4,
            MdbResult::InvalidEnd(_) => 5,
            MdbResult::ReceiveOverflow => 6,
            MdbResult::SendOverflow => 7,
            MdbResult::CodeError => 8,
            MdbResult::UartReadUnexpected(_) => 9,
            MdbResult::UartReadError => 10,
            MdbResult::UartReadOverflow => 11,
            MdbResult::UartReadParity => 12,
            MdbResult::UartSendBusy => 13,
            MdbResult::UartTxcUnexpected => 14,
            MdbResult::TimerCodeError => 15,
        }
    }

    pub const fn data(self) -> u8 {
        match self {
            MdbResult::Busy(d)
            | MdbResult::Timeout(d)
            | MdbResult::InvalidEnd(d)
            | MdbResult::UartReadUnexpected(d) => d,
            _ => 0,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, MdbResult::Success)
    }
}

//! MDB session state (§3 data model, §9 design notes).
//!
//! `RecvEnd` and `Error` are part of the state set spec.md names but do
//! not appear as a destination in the "state machine (complete)" table
//! in §4.5; they are kept here for data-model fidelity but are
//! unreachable through the transition function in `engine.rs` (reaching
//! either would itself be a `CODE_ERROR`/`TIMER_CODE_ERROR` condition).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Send,
    Recv,
    RecvEnd,
    BusReset,
    Done,
    Error,
}

impl State {
    /// Byte form used as MDB_RESULT diagnostic data (e.g. `BUSY(state)`,
    /// `TIMEOUT(RECV)` in spec.md scenario 6).
    pub const fn code(self) -> u8 {
        match self {
            State::Idle => 0,
            State::Send => 1,
            State::Recv => 2,
            State::RecvEnd => 3,
            State::BusReset => 4,
            State::Done => 5,
            State::Error => 6,
        }
    }

    pub const fn timer_should_be_armed(self) -> bool {
        matches!(self, State::Send | State::Recv | State::BusReset)
    }
}

//! The MDB session engine: a tagged-sum state machine whose transitions
//! are total functions of `(state, event)` (§9 design notes). Every
//! method here is pure with respect to the two MDB buffers passed in —
//! no interrupt, register, or pin access happens in this module, which
//! is what makes it testable on a host target without AVR hardware.
//!
//! The interrupt glue in `src/isr.rs` (AVR-only) calls these methods and
//! carries out the returned [`Effect`]s against real registers.

use crate::buffer::ByteBuffer;
use crate::clock::{elapsed, ms_to_ticks, Tick};
use crate::config::MDB_BYTE_TIMEOUT_MS;
use crate::mdb::result::MdbResult;
use crate::mdb::state::State;

/// `mdb_out` holds payload + checksum (§3: a block of 2-36 bytes).
pub const MDB_OUT_MAX: usize = 36;
/// `mdb_in` holds only the data bytes received so far; the terminator
/// byte (ACK/NAK/checksum) is never appended to it, so its cap is one
/// less than the full on-wire frame size (§8 boundary: 35 data bytes
/// fits exactly, 36 overflows).
pub const MDB_IN_MAX: usize = 35;

pub type MdbOutBuffer = ByteBuffer<MDB_OUT_MAX>;
pub type MdbInBuffer = ByteBuffer<MDB_IN_MAX>;

const ACK: u8 = 0x00;
const NAK: u8 = 0xFF;
const RET: u8 = 0xAA;

fn byte_timeout_ticks() -> Tick {
    ms_to_ticks(MDB_BYTE_TIMEOUT_MS)
}

/// Sum of `data` modulo 256 — the MDB checksum (§3, "memsum").
fn memsum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoneSnapshot {
    pub request_id: u8,
    pub result: MdbResult,
    pub duration_ticks: Tick,
}

/// What the caller must do after calling into the engine. Every variant
/// names a concrete register-level action; none of them loop or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Session stays IDLE; caller replies immediately with this result.
    Rejected(MdbResult),
    /// Session entered SEND (`begin`) or BUS_RESET (`bus_reset`). For a
    /// transaction, the caller must write `first_byte` to UDR with the
    /// 9th-bit register bit set, then clear it, arm the deadline for
    /// `deadline_ticks`, and enable the UDRE interrupt. For a bus reset,
    /// `first_byte` is always 0 and unused; the caller must instead
    /// disable UART RX/TX, drive the TX pin low as a GPIO output, and
    /// arm the deadline for `deadline_ticks` (§4.5 "Bus reset").
    Started { first_byte: u8, deadline_ticks: Tick },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdreAction {
    /// More bytes remain; write `byte` (9th bit clear) and re-arm the
    /// deadline.
    WriteNext { byte: u8, deadline_ticks: Tick },
    /// This was the last byte; write it, then swap the enabled
    /// interrupt from UDRE to TXC.
    WriteLast { byte: u8 },
    /// `mdb_out` was exhausted without the expected length sentinel —
    /// an internal consistency fault (§7), session finishes here.
    Done(DoneSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxcAction {
    /// Entered RECV: `mdb_in` was cleared, `in_chk` zeroed, deadline
    /// re-armed for `deadline_ticks`.
    EnterRecv { deadline_ticks: Tick },
    /// TXC fired outside SEND — internal consistency fault.
    Done(DoneSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxAction {
    /// Non-terminator data byte accepted; re-arm the deadline.
    Continue { deadline_ticks: Tick },
    /// Checksum mismatch, first retry: transmit RET and keep receiving.
    Retry { tx_byte: u8, deadline_ticks: Tick },
    /// Session concluded; if `tx_byte` is `Some`, write it (9th bit set)
    /// before publishing the response.
    Done { tx_byte: Option<u8>, snapshot: DoneSnapshot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineAction {
    /// Deadline fired while no session (or an already-finished one) was
    /// waiting on it; ignore (§9: "no-ops if the session has already
    /// ended").
    Ignore,
    Done(DoneSnapshot),
    /// BUS_RESET deadline elapsed: caller must restore UART RX/TX and
    /// release the TX-pin GPIO override before the session finishes.
    DoneAfterBusReset(DoneSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStatus {
    Ok,
    FramingError,
    Overrun,
    ParityError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Session {
    state: State,
    request_id: u8,
    result: MdbResult,
    in_chk: u8,
    retrying: bool,
    start_tick: Tick,
    duration_ticks: Tick,
}

impl Session {
    const fn idle() -> Self {
        Self {
            state: State::Idle,
            request_id: 0,
            result: MdbResult::Success,
            in_chk: 0,
            retrying: false,
            start_tick: 0,
            duration_ticks: 0,
        }
    }

    fn finish(&mut self, result: MdbResult, now: Tick) -> DoneSnapshot {
        self.duration_ticks = elapsed(now, self.start_tick);
        self.result = result;
        self.state = State::Done;
        DoneSnapshot { request_id: self.request_id, result, duration_ticks: self.duration_ticks }
    }
}

pub struct MdbEngine {
    session: Session,
}

impl MdbEngine {
    pub const fn new() -> Self {
        Self { session: Session::idle() }
    }

    pub fn state(&self) -> State {
        self.session.state
    }

    pub fn is_idle(&self) -> bool {
        self.session.state == State::Idle
    }

    /// Begin a new session (§4.5 "Begin"). `data` is the MDB frame
    /// payload including its address byte at `data[0]`; the engine
    /// appends the checksum. `uart_ready` reports whether the hardware
    /// can accept the first byte right now.
    pub fn begin(
        &mut self,
        out: &mut MdbOutBuffer,
        request_id: u8,
        data: &[u8],
        uart_ready: bool,
        now: Tick,
    ) -> BeginOutcome {
        if self.session.state != State::Idle {
            return BeginOutcome::Rejected(MdbResult::Busy(self.session.state.code()));
        }
        if !uart_ready {
            return BeginOutcome::Rejected(MdbResult::UartSendBusy);
        }

        out.clear_fast();
        if !out.append_n(data) || !out.append(memsum(data)) {
            // data longer than MDB_FRAME_MAX - 1: caller validates length
            // before calling begin, but guard regardless.
            return BeginOutcome::Rejected(MdbResult::SendOverflow);
        }

        self.session = Session { request_id, start_tick: now, state: State::Send, ..Session::idle() };
        let first_byte = out.get(0).unwrap_or(0);
        out.set_used(1);
        BeginOutcome::Started { first_byte, deadline_ticks: byte_timeout_ticks() }
    }

    pub fn on_udre(&mut self, out: &mut MdbOutBuffer, now: Tick) -> UdreAction {
        if self.session.state != State::Send {
            return UdreAction::Done(self.session.finish(MdbResult::CodeError, now));
        }
        let Some(byte) = out.take() else {
            return UdreAction::Done(self.session.finish(MdbResult::SendOverflow, now));
        };
        if out.used() >= out.len() {
            UdreAction::WriteLast { byte }
        } else {
            UdreAction::WriteNext { byte, deadline_ticks: byte_timeout_ticks() }
        }
    }

    pub fn on_txc(&mut self, in_buf: &mut MdbInBuffer, now: Tick) -> TxcAction {
        if self.session.state != State::Send {
            return TxcAction::Done(self.session.finish(MdbResult::UartTxcUnexpected, now));
        }
        in_buf.clear_full();
        self.session.in_chk = 0;
        self.session.state = State::Recv;
        TxcAction::EnterRecv { deadline_ticks: byte_timeout_ticks() }
    }

    pub fn on_rx(
        &mut self,
        in_buf: &mut MdbInBuffer,
        byte: u8,
        ninth_bit: bool,
        status: RxStatus,
        now: Tick,
    ) -> RxAction {
        match status {
            RxStatus::FramingError => {
                return RxAction::Done { tx_byte: None, snapshot: self.session.finish(MdbResult::UartReadError, now) }
            }
            RxStatus::Overrun => {
                return RxAction::Done {
                    tx_byte: None,
                    snapshot: self.session.finish(MdbResult::UartReadOverflow, now),
                }
            }
            RxStatus::ParityError => {
                return RxAction::Done {
                    tx_byte: None,
                    snapshot: self.session.finish(MdbResult::UartReadParity, now),
                }
            }
            RxStatus::Ok => {}
        }

        if !matches!(self.session.state, State::Send | State::Recv) {
            return RxAction::Done {
                tx_byte: None,
                snapshot: self.session.finish(MdbResult::UartReadUnexpected(byte), now),
            };
        }

        if !ninth_bit {
            if !in_buf.append(byte) {
                return RxAction::Done {
                    tx_byte: None,
                    snapshot: self.session.finish(MdbResult::ReceiveOverflow, now),
                };
            }
            self.session.in_chk = self.session.in_chk.wrapping_add(byte);
            self.session.state = State::Recv;
            return RxAction::Continue { deadline_ticks: byte_timeout_ticks() };
        }

        // Terminator byte.
        if in_buf.is_empty() {
            return match byte {
                ACK => RxAction::Done { tx_byte: None, snapshot: self.session.finish(MdbResult::Success, now) },
                NAK => RxAction::Done { tx_byte: None, snapshot: self.session.finish(MdbResult::Nak, now) },
                other => RxAction::Done {
                    tx_byte: None,
                    snapshot: self.session.finish(MdbResult::InvalidEnd(other), now),
                },
            };
        }

        if byte == self.session.in_chk {
            RxAction::Done { tx_byte: Some(ACK), snapshot: self.session.finish(MdbResult::Success, now) }
        } else if !self.session.retrying {
            in_buf.clear_full();
            self.session.in_chk = 0;
            self.session.retrying = true;
            self.session.state = State::Recv;
            RxAction::Retry { tx_byte: RET, deadline_ticks: byte_timeout_ticks() }
        } else {
            RxAction::Done { tx_byte: Some(NAK), snapshot: self.session.finish(MdbResult::InvalidChk, now) }
        }
    }

    pub fn on_deadline(&mut self, now: Tick) -> DeadlineAction {
        match self.session.state {
            State::Send => DeadlineAction::Done(self.session.finish(MdbResult::Timeout(State::Send.code()), now)),
            State::Recv => DeadlineAction::Done(self.session.finish(MdbResult::Timeout(State::Recv.code()), now)),
            State::BusReset => {
                DeadlineAction::DoneAfterBusReset(self.session.finish(MdbResult::Success, now))
            }
            State::Idle | State::Done => DeadlineAction::Ignore,
            State::RecvEnd | State::Error => {
                DeadlineAction::Done(self.session.finish(MdbResult::TimerCodeError, now))
            }
        }
    }

    /// §4.5 "Bus reset". Same BUSY precondition as `begin`; see
    /// `BeginOutcome::Started` for what the caller must do with the
    /// returned deadline.
    pub fn bus_reset(&mut self, request_id: u8, duration_ms: u16, now: Tick) -> BeginOutcome {
        if self.session.state != State::Idle {
            return BeginOutcome::Rejected(MdbResult::Busy(self.session.state.code()));
        }
        self.session = Session { request_id, start_tick: now, state: State::BusReset, ..Session::idle() };
        BeginOutcome::Started { first_byte: 0, deadline_ticks: ms_to_ticks(duration_ms) }
    }

    /// DONE -> IDLE (§4.5 table, "main-loop publish"). Only the main
    /// loop calls this, after it has read out the response via
    /// `snapshot`/the in-buffer contents.
    pub fn reset(&mut self) {
        self.session = Session::idle();
    }
}

impl Default for MdbEngine {
    fn default() -> Self {
        Self::new()
    }
}

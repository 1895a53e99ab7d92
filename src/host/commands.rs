//! Command dispatch (§4.6 "Commands") — the `request_exec(command,
//! data)` entry point named in §1. Frame-level validation has already
//! happened in `host::request::parse`; everything here assumes a
//! well-formed `(request_id, command, payload)` triple.

use crate::clock::Tick;
use crate::config::{FIRMWARE_VERSION, LOG_BUFFER_SIZE};
use crate::debug::LogBuffer;
use crate::host::fields::{command, error_code, response_header, MCUSR, MDB_DATA, MDB_DURATION10U, MDB_RESULT};
use crate::host::response::{build_error2, ResponseBuilder, ResponseBuffer};
use crate::mdb::engine::{BeginOutcome, MdbEngine, MdbOutBuffer};
use crate::mdb::result::MdbResult;

/// Largest outgoing MDB payload `MDB_TRANSACTION_SIMPLE` accepts before
/// the engine appends its own trailing checksum byte (§8: "MDB payload
/// length exactly 35: accepted; 36: BUFFER_OVERFLOW"). Derived from the
/// on-wire send cap, not the (separately-sized) receive buffer, so a
/// future change to either one can't silently decouple this check from
/// what it actually bounds.
pub const MDB_PAYLOAD_MAX: usize = crate::mdb::engine::MDB_OUT_MAX - 1;

/// The register-level action the caller must perform to actually start
/// a session the engine has moved into `SEND`/`BUS_RESET` (§4.5
/// "Begin"/"Bus reset"). `dispatch` only drives the pure engine; it
/// never touches hardware, so this is how `main.rs` learns what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    /// Write `first_byte` to UDR with the 9th bit set then cleared, arm
    /// the deadline for `deadline_ticks`, and enable the UDRE interrupt.
    Transaction { first_byte: u8, deadline_ticks: Tick },
    /// Disable UART RX/TX, drive the TX pin low as a GPIO output, and
    /// arm the deadline for `deadline_ticks`.
    BusReset { deadline_ticks: Tick },
}

/// What `dispatch` did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A complete response of this length was written to the response
    /// buffer; the caller may publish it immediately.
    Immediate(usize),
    /// An MDB session was started; the caller must carry out `SessionStart`
    /// before returning, and the response will be written later, when the
    /// main loop observes the engine reach `DONE`.
    Deferred(SessionStart),
}

/// Everything command dispatch needs beyond the parsed request. Held by
/// reference so `main.rs` owns all the actual storage.
pub struct CommandContext<'a> {
    pub response: &'a mut ResponseBuffer,
    pub engine: &'a mut MdbEngine,
    pub mdb_out: &'a mut MdbOutBuffer,
    pub log: &'a mut LogBuffer<LOG_BUFFER_SIZE>,
    pub now: Tick,
    pub mcusr: u8,
    pub uart_ready: bool,
    pub soft_reset_requested: &'a mut bool,
    pub reboot_requested: &'a mut bool,
}

fn immediate_result(ctx: &mut CommandContext<'_>, request_id: u8, result: MdbResult) -> DispatchOutcome {
    let mut b = ResponseBuilder::begin(ctx.response, request_id, response_header::OK, FIRMWARE_VERSION, ctx.now);
    b.field2(MDB_RESULT, result.code(), result.data());
    DispatchOutcome::Immediate(b.finish())
}

fn error(ctx: &mut CommandContext<'_>, request_id: u8, code: u8, arg: u8) -> DispatchOutcome {
    DispatchOutcome::Immediate(build_error2(ctx.response, request_id, FIRMWARE_VERSION, ctx.now, code, arg))
}

/// Dispatches one parsed request. Mirrors the engine's own split
/// between "reject now" and "runs under interrupts, collect later":
/// MDB commands that start a session return `Deferred`, everything
/// else is answered synchronously.
pub fn dispatch(ctx: &mut CommandContext<'_>, request_id: u8, cmd: u8, payload: &[u8]) -> DispatchOutcome {
    match cmd {
        command::STATUS => status(ctx, request_id, payload),
        command::CONFIG => error(ctx, request_id, error_code::NOT_IMPLEMENTED, 0),
        command::RESET => reset(ctx, request_id, payload),
        command::DEBUG => debug_dump(ctx, request_id),
        command::FLASH => error(ctx, request_id, error_code::NOT_IMPLEMENTED, 0),
        command::MDB_BUS_RESET => mdb_bus_reset(ctx, request_id, payload),
        command::MDB_TRANSACTION_SIMPLE => mdb_transaction_simple(ctx, request_id, payload),
        command::MDB_TRANSACTION_CUSTOM => error(ctx, request_id, error_code::NOT_IMPLEMENTED, 0),
        _ => error(ctx, request_id, error_code::UNKNOWN_COMMAND, cmd),
    }
}

fn status(ctx: &mut CommandContext<'_>, request_id: u8, payload: &[u8]) -> DispatchOutcome {
    if !payload.is_empty() {
        return error(ctx, request_id, error_code::INVALID_DATA, payload.len().min(255) as u8);
    }
    let mut b = ResponseBuilder::begin(ctx.response, request_id, response_header::OK, FIRMWARE_VERSION, ctx.now);
    b.field1(MCUSR, ctx.mcusr);
    DispatchOutcome::Immediate(b.finish())
}

fn reset(ctx: &mut CommandContext<'_>, request_id: u8, payload: &[u8]) -> DispatchOutcome {
    match payload {
        [0x01] => {
            *ctx.soft_reset_requested = true;
            immediate_result(ctx, request_id, MdbResult::Success)
        }
        [0xFF] => {
            *ctx.reboot_requested = true;
            immediate_result(ctx, request_id, MdbResult::Success)
        }
        other => error(ctx, request_id, error_code::INVALID_DATA, other.first().copied().unwrap_or(0)),
    }
}

fn debug_dump(ctx: &mut CommandContext<'_>, request_id: u8) -> DispatchOutcome {
    let mut b = ResponseBuilder::begin(ctx.response, request_id, response_header::OK, FIRMWARE_VERSION, ctx.now);
    let mut scratch = [0u8; LOG_BUFFER_SIZE];
    let n = ctx.log.drain_into(&mut scratch);
    b.field(MDB_DATA, &scratch[..n]);
    DispatchOutcome::Immediate(b.finish())
}

fn mdb_bus_reset(ctx: &mut CommandContext<'_>, request_id: u8, payload: &[u8]) -> DispatchOutcome {
    let &[hi, lo] = payload else {
        return error(ctx, request_id, error_code::INVALID_DATA, payload.len().min(255) as u8);
    };
    let duration_ms = u16::from_be_bytes([hi, lo]);
    match ctx.engine.bus_reset(request_id, duration_ms, ctx.now) {
        BeginOutcome::Rejected(result) => immediate_result(ctx, request_id, result),
        BeginOutcome::Started { deadline_ticks, .. } => {
            DispatchOutcome::Deferred(SessionStart::BusReset { deadline_ticks })
        }
    }
}

fn mdb_transaction_simple(ctx: &mut CommandContext<'_>, request_id: u8, payload: &[u8]) -> DispatchOutcome {
    if payload.is_empty() || payload.len() > MDB_PAYLOAD_MAX {
        return error(ctx, request_id, error_code::BUFFER_OVERFLOW, payload.len().min(255) as u8);
    }
    match ctx.engine.begin(ctx.mdb_out, request_id, payload, ctx.uart_ready, ctx.now) {
        BeginOutcome::Rejected(result) => immediate_result(ctx, request_id, result),
        BeginOutcome::Started { first_byte, deadline_ticks } => {
            DispatchOutcome::Deferred(SessionStart::Transaction { first_byte, deadline_ticks })
        }
    }
}

/// Builds the response for a concluded MDB session (§4.5 "Finish"):
/// called by the main loop once it observes `engine.state() ==
/// State::Done`, with the received payload bytes (already stripped of
/// the peripheral's checksum per §4.5) and the session's
/// `DoneSnapshot`.
pub fn build_mdb_done_response(
    response: &mut ResponseBuffer,
    now: Tick,
    request_id: u8,
    result: MdbResult,
    duration_ticks: Tick,
    payload: &[u8],
) -> usize {
    let mut b = ResponseBuilder::begin(response, request_id, response_header::OK, FIRMWARE_VERSION, now);
    b.field2(MDB_RESULT, result.code(), result.data());
    b.field2(MDB_DURATION10U, (duration_ticks >> 8) as u8, duration_ticks as u8);
    if result.is_success() {
        b.field(MDB_DATA, payload);
    }
    b.finish()
}

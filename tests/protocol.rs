//! End-to-end scenario tests (§8 "Scenarios") and the property-based
//! targets named there. These drive the same pure engine/request/
//! response modules the unit tests exercise, just composed the way the
//! main loop would: parse -> dispatch -> (for MDB commands) drive the
//! engine's event sequence -> build the DONE response.

use mdb_bridge_fw::crc::crc8_span;
use mdb_bridge_fw::host::commands::{self, CommandContext, DispatchOutcome};
use mdb_bridge_fw::host::fields::{self, error_code};
use mdb_bridge_fw::host::request::{self, ParsedRequest};
use mdb_bridge_fw::host::response::ResponseBuffer;
use mdb_bridge_fw::mdb::engine::{BeginOutcome, DeadlineAction, MdbEngine, MdbInBuffer, MdbOutBuffer, RxAction, RxStatus, TxcAction, UdreAction};
use mdb_bridge_fw::mdb::result::MdbResult;
use mdb_bridge_fw::debug::LogBuffer;

fn framed(request_id: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 4 + payload.len()];
    let length = buf.len() as u8;
    buf[0] = length;
    buf[1] = request_id;
    buf[2] = command;
    buf[3..3 + payload.len()].copy_from_slice(payload);
    let crc = crc8_span(&buf[..buf.len() - 1]);
    buf.push(crc);
    buf
}

fn field(slice: &[u8], index: usize) -> (u8, &[u8]) {
    let tag = slice[index];
    let len = slice[index + 1] as usize;
    (tag, &slice[index + 2..index + 2 + len])
}

#[test]
fn scenario_1_status_round_trip() {
    let frame = framed(1, fields::command::STATUS, &[]);
    assert_eq!(frame, vec![0x04, 0x01, 0x01, 0x79]);

    let parsed = request::parse(&frame).unwrap();
    let ParsedRequest::Frame { request_id, command, payload } = parsed else { panic!("not a frame") };

    let mut response = ResponseBuffer::new();
    let mut engine = MdbEngine::new();
    let mut mdb_out = MdbOutBuffer::new();
    let mut log: LogBuffer<128> = LogBuffer::new();
    let mut soft_reset = false;
    let mut reboot = false;
    let mut ctx = CommandContext {
        response: &mut response,
        engine: &mut engine,
        mdb_out: &mut mdb_out,
        log: &mut log,
        now: 1234,
        mcusr: 0x05,
        uart_ready: true,
        soft_reset_requested: &mut soft_reset,
        reboot_requested: &mut reboot,
    };
    let DispatchOutcome::Immediate(len) = commands::dispatch(&mut ctx, request_id, command, payload) else {
        panic!("status must answer immediately")
    };
    let slice = response.as_slice();
    assert_eq!(slice.len(), len);
    assert_eq!(crc8_span(&slice[..len - 1]), slice[len - 1]);
    assert_eq!(slice[1], 1);
    assert_eq!(slice[2], fields::response_header::OK);
    let (tag, bytes) = field(slice, 3);
    assert_eq!(tag, fields::FIRMWARE_VERSION);
    assert_eq!(bytes.len(), 2);
    let (tag, _) = field(slice, 7);
    assert_eq!(tag, fields::CLOCK10U);
    let (tag, bytes) = field(slice, 11);
    assert_eq!(tag, fields::MCUSR);
    assert_eq!(bytes, &[0x05]);
}

/// Drives a full MDB send/receive sequence the way the ISRs would,
/// returning the engine's `DoneSnapshot` result. `replies` is the
/// sequence of (byte, ninth_bit) pairs the simulated peripheral sends.
fn run_mdb_session(engine: &mut MdbEngine, out: &mut MdbOutBuffer, inb: &mut MdbInBuffer, replies: &[(u8, bool)]) -> MdbResult {
    // UDRE fires once per remaining byte (address byte already sent by begin()).
    loop {
        match engine.on_udre(out, 0) {
            UdreAction::WriteNext { .. } => continue,
            UdreAction::WriteLast { .. } => break,
            UdreAction::Done(s) => return s.result,
        }
    }
    match engine.on_txc(inb, 0) {
        TxcAction::EnterRecv { .. } => {}
        TxcAction::Done(s) => return s.result,
    }
    for &(byte, ninth_bit) in replies {
        match engine.on_rx(inb, byte, ninth_bit, RxStatus::Ok, 1) {
            RxAction::Continue { .. } => continue,
            RxAction::Retry { .. } => continue,
            RxAction::Done { snapshot, .. } => return snapshot.result,
        }
    }
    panic!("peripheral reply sequence never terminated the session");
}

#[test]
fn scenario_2_simple_poll_peripheral_acks() {
    let frame = framed(2, fields::command::MDB_TRANSACTION_SIMPLE, &[0x30]);
    assert_eq!(frame, vec![0x05, 0x02, 0x08, 0x30, 0xF9]);

    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    let outcome = engine.begin(&mut out, 2, &[0x30], true, 0);
    assert!(matches!(outcome, BeginOutcome::Started { first_byte: 0x30, .. }));
    assert_eq!(out.as_slice(), &[0x30, 0x30]);

    let result = run_mdb_session(&mut engine, &mut out, &mut inb, &[(0x00, true)]);
    assert_eq!(result, MdbResult::Success);
    assert!(inb.is_empty());
}

#[test]
fn scenario_3_multi_byte_reply_valid_checksum() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    engine.begin(&mut out, 3, &[0x30], true, 0);

    let result = run_mdb_session(&mut engine, &mut out, &mut inb, &[(0x11, false), (0x22, false), (0x33, true)]);
    assert_eq!(result, MdbResult::Success);
    assert_eq!(inb.as_slice(), &[0x11, 0x22]);
}

#[test]
fn scenario_4_bad_checksum_then_retry_then_success() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    engine.begin(&mut out, 4, &[0x30], true, 0);

    let result = run_mdb_session(
        &mut engine,
        &mut out,
        &mut inb,
        &[(0x11, false), (0x22, false), (0x34, true), (0x11, false), (0x22, false), (0x33, true)],
    );
    assert_eq!(result, MdbResult::Success);
    assert_eq!(inb.as_slice(), &[0x11, 0x22]);
}

#[test]
fn scenario_5_bad_checksum_twice_is_invalid_chk() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    engine.begin(&mut out, 5, &[0x30], true, 0);

    let result = run_mdb_session(
        &mut engine,
        &mut out,
        &mut inb,
        &[(0x11, false), (0x22, false), (0x34, true), (0x11, false), (0x22, false), (0x34, true)],
    );
    assert_eq!(result, MdbResult::InvalidChk);
}

#[test]
fn scenario_6_timeout_during_recv() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    engine.begin(&mut out, 6, &[0x30], true, 0);
    loop {
        match engine.on_udre(&mut out, 0) {
            UdreAction::WriteNext { .. } => continue,
            UdreAction::WriteLast { .. } => break,
            UdreAction::Done(_) => panic!("unexpected early DONE"),
        }
    }
    engine.on_txc(&mut inb, 0);

    match engine.on_deadline(600) {
        DeadlineAction::Done(snapshot) => {
            assert_eq!(snapshot.result, MdbResult::Timeout(mdb_bridge_fw::mdb::state::State::Recv.code()));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn host_frame_length_below_minimum_is_rejected_with_frame_length() {
    let bad = [0x03u8, 0x01, 0x01, 0x00];
    assert_eq!(request::parse(&bad), Err(request::FrameError::FrameLength));
    assert_eq!(request::FrameError::FrameLength.code(), error_code::FRAME_LENGTH);
}

#[test]
fn mdb_payload_boundary_35_accepted_36_rejected_by_engine() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    assert!(matches!(engine.begin(&mut out, 1, &[0xAA; 35], true, 0), BeginOutcome::Started { .. }));

    let mut engine2 = MdbEngine::new();
    let mut out2 = MdbOutBuffer::new();
    assert_eq!(engine2.begin(&mut out2, 1, &[0xAA; 36], true, 0), BeginOutcome::Rejected(MdbResult::SendOverflow));
}

#[test]
fn mdb_receive_boundary_35_fits_36_overflows() {
    let mut engine = MdbEngine::new();
    let mut out = MdbOutBuffer::new();
    let mut inb = MdbInBuffer::new();
    engine.begin(&mut out, 1, &[0x30], true, 0);
    loop {
        match engine.on_udre(&mut out, 0) {
            UdreAction::WriteNext { .. } => continue,
            UdreAction::WriteLast { .. } => break,
            UdreAction::Done(_) => panic!("unexpected early DONE"),
        }
    }
    engine.on_txc(&mut inb, 0);
    for _ in 0..35 {
        assert!(matches!(engine.on_rx(&mut inb, 0xAA, false, RxStatus::Ok, 0), RxAction::Continue { .. }));
    }
    match engine.on_rx(&mut inb, 0xAA, false, RxStatus::Ok, 0) {
        RxAction::Done { snapshot, .. } => assert_eq!(snapshot.result, MdbResult::ReceiveOverflow),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn bus_reset_zero_ms_finishes_immediately() {
    let mut engine = MdbEngine::new();
    engine.bus_reset(9, 0, 100);
    match engine.on_deadline(100) {
        DeadlineAction::DoneAfterBusReset(snapshot) => {
            assert_eq!(snapshot.result, MdbResult::Success);
            assert_eq!(snapshot.request_id, 9);
        }
        other => panic!("unexpected {other:?}"),
    }
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// (a) random well-formed host frames round-trip through parse.
        #[test]
        fn well_formed_frames_round_trip(request_id in 1u8..=255, command in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..60)) {
            let frame = framed(request_id, command, &payload);
            let parsed = request::parse(&frame).unwrap();
            match parsed {
                ParsedRequest::Frame { request_id: rid, command: cmd, payload: p } => {
                    prop_assert_eq!(rid, request_id);
                    prop_assert_eq!(cmd, command);
                    prop_assert_eq!(p, payload.as_slice());
                }
                ParsedRequest::KeypadByte(_) => prop_assert!(frame.len() == 1),
            }
        }

        /// (b) random MDB payloads produce on-wire bytes equal to
        /// payload ++ checksum.
        #[test]
        fn mdb_send_appends_correct_checksum(payload in proptest::collection::vec(any::<u8>(), 1..=35)) {
            let mut engine = MdbEngine::new();
            let mut out = MdbOutBuffer::new();
            engine.begin(&mut out, 1, &payload, true, 0);
            let expected_sum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
            prop_assert_eq!(out.as_slice().last().copied(), Some(expected_sum));
            prop_assert_eq!(&out.as_slice()[..payload.len()], payload.as_slice());
        }

        /// (c) any interleaving of a successful send/receive sequence
        /// preserves state-machine safety: idle at boot, done before
        /// reset, idle again after reset.
        #[test]
        fn state_machine_returns_to_idle_after_every_session(payload in proptest::collection::vec(any::<u8>(), 1..=35)) {
            let mut engine = MdbEngine::new();
            let mut out = MdbOutBuffer::new();
            let mut inb = MdbInBuffer::new();
            prop_assert!(engine.is_idle());
            engine.begin(&mut out, 1, &payload, true, 0);
            let _ = run_mdb_session(&mut engine, &mut out, &mut inb, &[(0x00, true)]);
            prop_assert_eq!(engine.state(), mdb_bridge_fw::mdb::state::State::Done);
            engine.reset();
            prop_assert!(engine.is_idle());
        }
    }
}

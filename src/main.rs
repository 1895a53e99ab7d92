//! AVR entry point: board bring-up plus the foreground loop (§5
//! "Scheduling"). All protocol logic lives in the library crate; this
//! file only wires hardware and drives the loop described there.

#![no_std]
#![no_main]

use avr_device::atmega328p::Peripherals;
use mdb_bridge_fw::clock::avr::{HardwareClock, HardwareDeadline};
use mdb_bridge_fw::clock::{Clock, DeadlineTimer};
use mdb_bridge_fw::config;
use mdb_bridge_fw::host::commands::{self, CommandContext, DispatchOutcome, SessionStart};
use mdb_bridge_fw::host::fields::response_header;
use mdb_bridge_fw::host::request::{self, ParsedRequest};
use mdb_bridge_fw::host::response::{build_error2, ResponseBuilder};
use mdb_bridge_fw::isr::{Shared, SHARED};
use mdb_bridge_fw::secondary_bus::{self, notify_should_assert};
use mdb_bridge_fw::uart;

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        avr_device::asm::sleep();
    }
}

/// Reset-cause register value, latched across a watchdog reset in a
/// reserved no-init byte (§6 "Persisted state"). Board-specific startup
/// code (not part of this core) is responsible for copying MCUSR here
/// before clearing it and disabling the watchdog early in reset; this
/// file only reads the latched value.
#[link_section = ".noinit"]
static mut SAVED_MCUSR: u8 = 0;

fn init_board(dp: &Peripherals) {
    mdb_bridge_fw::uart::avr::init(&dp.USART0);
    secondary_bus::avr::init(&dp.TWI);

    // TIMER0: 10 µs tick (prescale 8, CTC, OCR0A = 19 at 16 MHz).
    dp.TC0.tccr0a.write(|w| w.wgm0().ctc());
    dp.TC0.ocr0a.write(|w| unsafe { w.bits(19) });
    dp.TC0.timsk0.write(|w| w.ocie0a().set_bit());
    dp.TC0.tccr0b.write(|w| w.cs0().prescale_8());

    unsafe { avr_device::interrupt::enable() };
}

/// Drains one concluded MDB session into the outbound response buffer
/// (§4.5 "Finish") and returns the engine to IDLE. No-op if no session
/// has reached DONE since the last call.
fn publish_mdb_done(now: u16) {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let Some(snapshot) = shared.last_done.take() else { return };
        let payload_len = shared.mdb_in.len();
        let mut payload = [0u8; mdb_bridge_fw::mdb::engine::MDB_IN_MAX];
        payload[..payload_len].copy_from_slice(shared.mdb_in.as_slice());
        commands::build_mdb_done_response(
            &mut shared.outbound,
            now,
            snapshot.request_id,
            snapshot.result,
            snapshot.duration_ticks,
            &payload[..payload_len],
        );
        shared.engine.reset();
    });
}

/// Carries out the register-level action `dispatch` deferred to us
/// (§4.5 "Begin"/"Bus reset"): the pure engine has already moved to
/// `SEND`/`BUS_RESET`, but nothing about that state change touches
/// hardware until this runs, so the ISRs it arms here are what actually
/// drives the session forward instead of leaving it to hang until the
/// per-byte deadline — which will never fire either, since arming it is
/// exactly what this function does.
fn start_mdb_session(dp: &Peripherals, start: SessionStart) {
    match start {
        SessionStart::Transaction { first_byte, deadline_ticks } => {
            uart::avr::send_marked_byte(&dp.USART0, first_byte);
            let mut deadline = HardwareDeadline::new();
            deadline.arm(deadline_ticks);
            uart::avr::enable_udre(&dp.USART0);
        }
        SessionStart::BusReset { deadline_ticks } => {
            uart::avr::set_rx_tx_enabled(&dp.USART0, false);
            uart::avr::force_tx_low(&dp.PORTD);
            let mut deadline = HardwareDeadline::new();
            deadline.arm(deadline_ticks);
        }
    }
}

/// Pulls one completed request out of `inbound`, dispatches it, and
/// writes either an immediate response or starts a deferred MDB
/// session (§4.6 "Request parsing").
fn handle_inbound_request(dp: &Peripherals, now: u16, mcusr: u8, soft_reset_requested: &mut bool, reboot_requested: &mut bool) {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let mut scratch = [0u8; config::HOST_FRAME_MAX];
        let n = shared.inbound.len().min(scratch.len());
        scratch[..n].copy_from_slice(&shared.inbound.as_slice()[..n]);
        shared.inbound.clear_fast();

        match request::parse(&scratch[..n]) {
            Ok(ParsedRequest::KeypadByte(byte)) => {
                let mut b = ResponseBuilder::begin(
                    &mut shared.outbound,
                    0,
                    response_header::TWI_LISTEN,
                    config::FIRMWARE_VERSION,
                    now,
                );
                b.field2(mdb_bridge_fw::host::fields::TWI_DATA, 0, byte);
                b.finish();
            }
            Ok(ParsedRequest::Frame { request_id, command, payload }) => {
                let uart_ready = mdb_bridge_fw::uart::avr::tx_ready(&dp.USART0);
                let Shared { engine, mdb_out, log, outbound, .. } = &mut *shared;
                let mut ctx = CommandContext {
                    response: outbound,
                    engine,
                    mdb_out,
                    log,
                    now,
                    mcusr,
                    uart_ready,
                    soft_reset_requested,
                    reboot_requested,
                };
                if let DispatchOutcome::Deferred(start) = commands::dispatch(&mut ctx, request_id, command, payload) {
                    start_mdb_session(dp, start);
                }
            }
            Err(err) => {
                build_error2(&mut shared.outbound, 0, config::FIRMWARE_VERSION, now, err.code(), err.arg());
            }
        }
    });
}

#[avr_device::entry]
fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };
    let mcusr = unsafe { core::ptr::read_volatile(&raw const SAVED_MCUSR) };
    init_board(&dp);

    let clock = HardwareClock;
    let mut soft_reset_requested = false;
    let mut reboot_requested = false;

    loop {
        let now = clock.now();

        publish_mdb_done(now);

        let should_parse = avr_device::interrupt::free(|cs| {
            let shared = SHARED.borrow(cs).borrow();
            shared.bus.is_idle() && !shared.inbound.is_empty()
        });
        if should_parse {
            handle_inbound_request(&dp, now, mcusr, &mut soft_reset_requested, &mut reboot_requested);
        }

        if soft_reset_requested {
            avr_device::interrupt::free(|cs| SHARED.borrow(cs).borrow_mut().engine.reset());
            soft_reset_requested = false;
        }

        if reboot_requested {
            // Force an unconditional watchdog reset (§6 RESET=0xFF).
            dp.WDT.wdtcsr.write(|w| w.wde().set_bit());
            loop {
                avr_device::asm::sleep();
            }
        }

        // Assert/deassert the host-notify edge (§4.7, §6 "Side channels").
        // The GPIO write itself is board-specific (§14 `NotifyPin`); this
        // core only computes whether it should be asserted.
        avr_device::interrupt::free(|cs| {
            let shared = SHARED.borrow(cs).borrow();
            let _asserted = notify_should_assert(&shared.bus, &shared.outbound);
        });

        // Kick the watchdog once per iteration (§5 "Blocking").
        dp.WDT.wdtcsr.modify(|_, w| w.wdce().set_bit().wde().set_bit());
        dp.WDT.wdtcsr.write(|w| w.wde().set_bit().wdpl().cycles_32k());

        // ~300 µs idle delay when no work is pending.
        for _ in 0..480u16 {
            avr_device::asm::nop();
        }
    }
}

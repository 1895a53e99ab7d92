//! Interrupt vector wiring (AVR only). Every vector here does the
//! minimum register access to classify the event, then hands off to
//! the pure state machines in `mdb::engine` and `secondary_bus` — none
//! of the protocol logic itself lives in this file (§9 "Shared mutable
//! state without pointers to volatile").
//!
//! Shared state crossing an ISR boundary is held in
//! `avr_device::interrupt::Mutex<RefCell<_>>` statics, following the
//! same pattern `clock::avr` uses for the tick counter.

use core::cell::RefCell;

use avr_device::atmega328p::{Peripherals, PORTD, TC1, TWI, USART0};
use avr_device::interrupt::Mutex;

use crate::clock::Tick;
use crate::config::LOG_BUFFER_SIZE;
use crate::debug::LogBuffer;
use crate::mdb::engine::{DoneSnapshot, MdbEngine, MdbInBuffer, MdbOutBuffer};
use crate::secondary_bus;
use crate::secondary_bus::{InboundBuffer, OutboundBuffer, SecondaryBus};
use crate::uart::avr as uart_hw;

pub struct Shared {
    pub engine: MdbEngine,
    pub mdb_out: MdbOutBuffer,
    pub mdb_in: MdbInBuffer,
    pub bus: SecondaryBus,
    pub inbound: InboundBuffer,
    pub outbound: OutboundBuffer,
    pub log: LogBuffer<LOG_BUFFER_SIZE>,
    pub outbound_sent: usize,
    /// Populated by whichever ISR drives the session into `Done`;
    /// taken by the main loop, which uses it to build the response and
    /// then calls `engine.reset()`. Avoids the main loop having to poll
    /// `engine.state()` every iteration, and avoids re-deriving
    /// `request_id`/`duration_ticks` since the engine forgets both the
    /// moment `reset()` runs.
    pub last_done: Option<DoneSnapshot>,
}

impl Shared {
    const fn new() -> Self {
        Self {
            engine: MdbEngine::new(),
            mdb_out: MdbOutBuffer::new(),
            mdb_in: MdbInBuffer::new(),
            bus: SecondaryBus::new(),
            inbound: InboundBuffer::new(),
            outbound: OutboundBuffer::new(),
            log: LogBuffer::new(),
            outbound_sent: 0,
            last_done: None,
        }
    }
}

pub static SHARED: Mutex<RefCell<Shared>> = Mutex::new(RefCell::new(Shared::new()));

fn now() -> Tick {
    crate::clock::avr::HardwareClock.now()
}

fn usart0() -> USART0 {
    unsafe { Peripherals::steal() }.USART0
}

fn tc1() -> TC1 {
    unsafe { Peripherals::steal() }.TC1
}

fn twi() -> TWI {
    unsafe { Peripherals::steal() }.TWI
}

fn portd() -> PORTD {
    unsafe { Peripherals::steal() }.PORTD
}

/// MDB per-byte / bus-reset deadline (TIMER1 COMPA, §4.3, §4.5).
#[avr_device::interrupt(atmega328p)]
fn TIMER1_COMPA() {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let t = now();
        match shared.engine.on_deadline(t) {
            crate::mdb::engine::DeadlineAction::Ignore => {}
            crate::mdb::engine::DeadlineAction::Done(snapshot) => {
                shared.last_done = Some(snapshot);
            }
            crate::mdb::engine::DeadlineAction::DoneAfterBusReset(snapshot) => {
                let usart = usart0();
                uart_hw::release_tx_override(&portd());
                uart_hw::set_rx_tx_enabled(&usart, true);
                shared.last_done = Some(snapshot);
            }
        }
    });
}

/// MDB outbound data-register-empty (UDRE, §4.4 steps 2-3).
#[avr_device::interrupt(atmega328p)]
fn USART_UDRE() {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let usart = usart0();
        let t = now();
        let out = &mut shared.mdb_out;
        match shared.engine.on_udre(out, t) {
            crate::mdb::engine::UdreAction::WriteNext { byte, deadline_ticks } => {
                uart_hw::send_data_byte(&usart, byte);
                tc1().ocr1a.write(|w| unsafe { w.bits(deadline_ticks) });
            }
            crate::mdb::engine::UdreAction::WriteLast { byte } => {
                uart_hw::send_data_byte(&usart, byte);
                uart_hw::disable_udre(&usart);
                uart_hw::enable_txc(&usart);
            }
            crate::mdb::engine::UdreAction::Done(snapshot) => {
                uart_hw::disable_udre(&usart);
                shared.last_done = Some(snapshot);
            }
        }
    });
}

/// MDB transmit-complete (TXC, §4.4 step 4, §4.5 SEND -> RECV).
#[avr_device::interrupt(atmega328p)]
fn USART_TX() {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let usart = usart0();
        let t = now();
        let in_buf = &mut shared.mdb_in;
        match shared.engine.on_txc(in_buf, t) {
            crate::mdb::engine::TxcAction::EnterRecv { deadline_ticks } => {
                uart_hw::disable_txc(&usart);
                tc1().ocr1a.write(|w| unsafe { w.bits(deadline_ticks) });
            }
            crate::mdb::engine::TxcAction::Done(snapshot) => {
                uart_hw::disable_txc(&usart);
                shared.last_done = Some(snapshot);
            }
        }
    });
}

/// MDB receive-complete (RX, §4.4 "Receive").
#[avr_device::interrupt(atmega328p)]
fn USART_RX() {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let usart = usart0();
        let (bits, byte, ninth_bit) = uart_hw::read_rx(&usart);
        let status = bits.classify();
        let t = now();
        let in_buf = &mut shared.mdb_in;
        match shared.engine.on_rx(in_buf, byte, ninth_bit, status, t) {
            crate::mdb::engine::RxAction::Continue { deadline_ticks } => {
                tc1().ocr1a.write(|w| unsafe { w.bits(deadline_ticks) });
            }
            crate::mdb::engine::RxAction::Retry { tx_byte, deadline_ticks } => {
                uart_hw::send_marked_byte(&usart, tx_byte);
                tc1().ocr1a.write(|w| unsafe { w.bits(deadline_ticks) });
            }
            crate::mdb::engine::RxAction::Done { tx_byte, snapshot } => {
                if let Some(b) = tx_byte {
                    uart_hw::send_marked_byte(&usart, b);
                }
                shared.last_done = Some(snapshot);
            }
        }
    });
}

/// Secondary-bus slave byte event (§4.7). Real hardware distinguishes
/// address/data/stop/error by the TWI status register; this vector
/// reads it once and dispatches, mirroring the pure driver's event set.
#[avr_device::interrupt(atmega328p)]
fn TWI_VEC() {
    avr_device::interrupt::free(|cs| {
        let mut shared = SHARED.borrow(cs).borrow_mut();
        let dev = twi();
        match secondary_bus::avr::status(&dev) {
            // SLA+W received, ACK returned by hardware already; decide
            // whether we *should* have ACKed based on inbound state.
            0x60 | 0x68 => {
                let ack = {
                    let inbound = &shared.inbound;
                    shared.bus.on_address_write(inbound)
                };
                if ack {
                    secondary_bus::avr::ack(&dev);
                } else {
                    secondary_bus::avr::nack(&dev);
                }
            }
            // Data byte received.
            0x80 | 0x90 => {
                let byte = secondary_bus::avr::read_data(&dev);
                let inbound = &mut shared.inbound;
                if shared.bus.on_data(inbound, byte) {
                    secondary_bus::avr::ack(&dev);
                } else {
                    secondary_bus::avr::nack(&dev);
                }
            }
            // Stop or repeated start while addressed as slave.
            0xA0 => {
                shared.bus.on_stop();
                secondary_bus::avr::ack(&dev);
            }
            // SLA+R received.
            0xA8 | 0xB0 => {
                let (byte, ack) = {
                    let outbound = &shared.outbound;
                    shared.bus.on_address_read(outbound)
                };
                shared.outbound_sent = 0;
                secondary_bus::avr::write_data(&dev, byte);
                if ack {
                    secondary_bus::avr::ack(&dev);
                } else {
                    secondary_bus::avr::nack(&dev);
                }
            }
            // Data byte transmitted, ACK received: send the next one.
            0xB8 => {
                let mut sent = shared.outbound_sent;
                let outbound = &mut shared.outbound;
                let next = shared.bus.on_byte_acked(outbound, &mut sent);
                shared.outbound_sent = sent;
                match next {
                    Some(byte) => {
                        secondary_bus::avr::write_data(&dev, byte);
                        secondary_bus::avr::ack(&dev);
                    }
                    None => {
                        shared.bus.on_transfer_end(outbound);
                        secondary_bus::avr::nack(&dev);
                    }
                }
            }
            // Last byte transmitted, NACK received, or a bus error.
            0xC0 | 0xC8 => {
                let outbound = &mut shared.outbound;
                shared.bus.on_transfer_end(outbound);
                secondary_bus::avr::ack(&dev);
            }
            0x00 => {
                let inbound = &mut shared.inbound;
                shared.bus.on_bus_error(inbound);
                secondary_bus::avr::ack(&dev);
            }
            _ => {
                secondary_bus::avr::ack(&dev);
            }
        }
    });
}

/// 10 µs free-running tick (TIMER0 COMPA, §4.3).
#[avr_device::interrupt(atmega328p)]
fn TIMER0_COMPA() {
    avr_device::interrupt::free(crate::clock::avr::on_tick_interrupt);
}

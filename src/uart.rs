//! 9600-baud, 9-data-bit, no-parity, 1-stop UART driver for the MDB
//! auxiliary bus (§4.4).
//!
//! This module only holds the tiny pieces of decode logic worth sharing
//! between host tests and the AVR glue (classifying a receive-status
//! snapshot); the rest of §4.4 — register setup, the UDRE/TXC/RX
//! interrupt vectors themselves — lives in `src/isr.rs` since it's
//! inseparable from the hardware.

use crate::mdb::engine::RxStatus;

/// A snapshot of the three status bits read from UCSR0A alongside the
/// received byte. Order matters on real hardware (status registers,
/// then UDR, must be read in that order to latch correctly) but that
/// ordering constraint belongs to the ISR, not to this classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxStatusBits {
    pub frame_error: bool,
    pub data_overrun: bool,
    pub parity_error: bool,
}

impl RxStatusBits {
    pub const fn classify(self) -> RxStatus {
        if self.frame_error {
            RxStatus::FramingError
        } else if self.data_overrun {
            RxStatus::Overrun
        } else if self.parity_error {
            RxStatus::ParityError
        } else {
            RxStatus::Ok
        }
    }
}

#[cfg(target_arch = "avr")]
pub mod avr {
    //! Register-level glue for ATmega328P USART0 in 9-bit mode (UCSZ0 =
    //! 0b11 with UCSZ02 set). The 9th bit lives in UCSR0B (TXB80/RXB80).

    use avr_device::atmega328p::{PORTD, USART0};

    use super::RxStatusBits;

    /// 16 MHz / (16 * 9600) - 1, per the ATmega328P datasheet's UBRR
    /// formula for asynchronous normal-speed mode.
    pub const UBRR_9600_AT_16MHZ: u16 = 103;

    pub fn init(usart: &USART0) {
        usart.ubrr0.write(|w| unsafe { w.bits(UBRR_9600_AT_16MHZ) });
        usart.ucsr0c.write(|w| w.ucsz0().bits(0b11));
        usart.ucsr0b.modify(|_, w| w.ucsz02().set_bit().rxen0().set_bit().txen0().set_bit().rxcie0().set_bit());
    }

    /// Sends the address/terminator byte directly (used by `begin()`'s
    /// synchronous first write and by ACK/RET/NAK replies): sets the 9th
    /// bit, writes UDR, then clears the 9th bit for subsequent data
    /// bytes.
    pub fn send_marked_byte(usart: &USART0, byte: u8) {
        usart.ucsr0b.modify(|_, w| w.txb80().set_bit());
        usart.udr0.write(|w| unsafe { w.bits(byte) });
        usart.ucsr0b.modify(|_, w| w.txb80().clear_bit());
    }

    pub fn send_data_byte(usart: &USART0, byte: u8) {
        usart.ucsr0b.modify(|_, w| w.txb80().clear_bit());
        usart.udr0.write(|w| unsafe { w.bits(byte) });
    }

    pub fn tx_ready(usart: &USART0) -> bool {
        usart.ucsr0a.read().udre0().bit_is_set()
    }

    pub fn enable_udre(usart: &USART0) {
        usart.ucsr0b.modify(|_, w| w.udrie0().set_bit());
    }

    pub fn disable_udre(usart: &USART0) {
        usart.ucsr0b.modify(|_, w| w.udrie0().clear_bit());
    }

    pub fn enable_txc(usart: &USART0) {
        usart.ucsr0b.modify(|_, w| w.txcie0().set_bit());
    }

    pub fn disable_txc(usart: &USART0) {
        usart.ucsr0b.modify(|_, w| w.txcie0().clear_bit());
    }

    pub fn set_rx_tx_enabled(usart: &USART0, enabled: bool) {
        usart.ucsr0b.modify(|_, w| w.rxen0().bit(enabled).txen0().bit(enabled));
    }

    /// Drives TXD0 (PD1) low as a plain GPIO output, overriding the
    /// USART transmitter (§4.5 "Bus reset"). Caller must have already
    /// disabled the USART's own TX/RX via `set_rx_tx_enabled(.., false)`.
    pub fn force_tx_low(portd: &PORTD) {
        portd.portd.modify(|_, w| w.pd1().clear_bit());
        portd.ddrd.modify(|_, w| w.pd1().set_bit());
    }

    /// Releases the GPIO override on PD1, returning it to input so the
    /// USART peripheral drives it again once re-enabled.
    pub fn release_tx_override(portd: &PORTD) {
        portd.ddrd.modify(|_, w| w.pd1().clear_bit());
    }

    /// Reads status registers A/B then UDR, in that order — significant
    /// for the hardware latch (§4.4).
    pub fn read_rx(usart: &USART0) -> (RxStatusBits, u8, bool) {
        let sra = usart.ucsr0a.read();
        let srb = usart.ucsr0b.read();
        let data = usart.udr0.read().bits();
        let status = RxStatusBits {
            frame_error: sra.fe0().bit_is_set(),
            data_overrun: sra.dor0().bit_is_set(),
            parity_error: sra.upe0().bit_is_set(),
        };
        (status, data, srb.rxb80().bit_is_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_clean_read_as_ok() {
        let s = RxStatusBits { frame_error: false, data_overrun: false, parity_error: false };
        assert_eq!(s.classify(), RxStatus::Ok);
    }

    #[test]
    fn framing_error_takes_priority() {
        let s = RxStatusBits { frame_error: true, data_overrun: true, parity_error: true };
        assert_eq!(s.classify(), RxStatus::FramingError);
    }

    #[test]
    fn overrun_without_framing_error() {
        let s = RxStatusBits { frame_error: false, data_overrun: true, parity_error: false };
        assert_eq!(s.classify(), RxStatus::Overrun);
    }

    #[test]
    fn parity_error_is_defensive_only() {
        let s = RxStatusBits { frame_error: false, data_overrun: false, parity_error: true };
        assert_eq!(s.classify(), RxStatus::ParityError);
    }
}

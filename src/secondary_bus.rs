//! Secondary-bus slave driver (§4.7): a byte-level handler for a
//! multi-master serial slave bus at address `0x78`. Never calls into
//! the MDB engine and allocates no memory; the main loop only parses
//! `inbound` after observing `idle == true`.
//!
//! As with `mdb::engine`, the state transitions are pure functions over
//! the two buffers and an `idle` flag, separated from the TWI register
//! glue in `#[cfg(target_arch = "avr")] mod avr` so the slave protocol
//! itself is host-testable.

use crate::host::packet::HOST_FRAME_MAX;

pub type InboundBuffer = crate::buffer::ByteBuffer<HOST_FRAME_MAX>;
pub type OutboundBuffer = crate::buffer::ByteBuffer<HOST_FRAME_MAX>;

pub struct SecondaryBus {
    idle: bool,
}

impl SecondaryBus {
    pub const fn new() -> Self {
        Self { idle: true }
    }

    pub const fn is_idle(&self) -> bool {
        self.idle
    }

    /// Address received, host wants to write (§4.7 "Address received
    /// (W)"): ACK only if the prior request has been consumed.
    pub fn on_address_write(&mut self, inbound: &InboundBuffer) -> bool {
        self.idle = false;
        inbound.is_empty()
    }

    /// Data byte received: append then ACK, or NACK if full (the main
    /// loop emits the overflow response, this driver only reports the
    /// NACK).
    pub fn on_data(&mut self, inbound: &mut InboundBuffer, byte: u8) -> bool {
        inbound.append(byte)
    }

    /// Stop condition: marks the bus idle so the main loop may parse
    /// `inbound`.
    pub fn on_stop(&mut self) {
        self.idle = true;
    }

    /// Address received, host wants to read (§4.7 "Address received
    /// (R)"): transmits the first outbound byte with ACK if a response
    /// is ready, else transmits 0 with NACK ("no response yet").
    pub fn on_address_read(&mut self, outbound: &OutboundBuffer) -> (u8, bool) {
        self.idle = false;
        if outbound.is_empty() {
            (0, false)
        } else {
            (outbound.get(0).unwrap_or(0), true)
        }
    }

    /// Byte sent and ACKed by the host: returns the next byte to send,
    /// or `None` if the outbound buffer is exhausted (caller treats
    /// that the same as a NACK — clears `outbound`, marks idle).
    pub fn on_byte_acked(&mut self, outbound: &mut OutboundBuffer, sent_index: &mut usize) -> Option<u8> {
        *sent_index += 1;
        outbound.get(*sent_index)
    }

    /// Last byte sent, or the host NACKed: clears `outbound` and marks
    /// idle (§4.7 "Last byte / NACK from host").
    pub fn on_transfer_end(&mut self, outbound: &mut OutboundBuffer) {
        outbound.clear_fast();
        self.idle = true;
    }

    /// Bus error: issue STOP, clear `inbound`, restore ACK expectation.
    pub fn on_bus_error(&mut self, inbound: &mut InboundBuffer) {
        inbound.clear_fast();
        self.idle = true;
    }
}

impl Default for SecondaryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-notify pin logic (§4.7, §6 "Side channels"): asserted exactly
/// when a response is waiting and the bus isn't mid-session.
pub fn notify_should_assert(bus: &SecondaryBus, outbound: &OutboundBuffer) -> bool {
    !outbound.is_empty() && bus.is_idle()
}

#[cfg(target_arch = "avr")]
pub mod avr {
    //! Register-level glue for the ATmega328P's hardware TWI peripheral
    //! in slave mode, matching the address/data/stop event set the pure
    //! driver above expects. Interrupt wiring lives in `src/isr.rs`.

    use avr_device::atmega328p::TWI;

    pub const SLAVE_ADDRESS: u8 = crate::config::TWI_ADDRESS;

    pub fn init(twi: &TWI) {
        twi.twar.write(|w| unsafe { w.twa().bits(SLAVE_ADDRESS) });
        twi.twcr.write(|w| w.twea().set_bit().twen().set_bit().twie().set_bit());
    }

    /// Re-arms the peripheral to ACK the next event; TWI hardware
    /// requires `TWINT` to be cleared (by writing 1) for the state
    /// machine to advance.
    pub fn ack(twi: &TWI) {
        twi.twcr.modify(|_, w| w.twea().set_bit().twint().set_bit());
    }

    pub fn nack(twi: &TWI) {
        twi.twcr.modify(|_, w| w.twea().clear_bit().twint().set_bit());
    }

    pub fn read_data(twi: &TWI) -> u8 {
        twi.twdr.read().bits()
    }

    pub fn write_data(twi: &TWI, byte: u8) {
        twi.twdr.write(|w| unsafe { w.bits(byte) });
    }

    pub fn status(twi: &TWI) -> u8 {
        twi.twsr.read().tws().bits()
    }
}

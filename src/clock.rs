//! Free-running 10 µs tick counter and one-shot deadline timer (§4.3).
//!
//! The tick counter is a 16-bit value that wraps modulo 2^16 (~0.655 s
//! full range); all duration arithmetic in this crate relies on wrapping
//! subtraction to recover elapsed ticks, which is only valid for
//! intervals shorter than that range — true of every MDB per-byte and
//! bus-reset deadline we use.

pub type Tick = u16;

/// Ticks are 10 µs; `ms_to_ticks` multiplies by 100.
pub const fn ms_to_ticks(ms: u16) -> Tick {
    ms.wrapping_mul(100)
}

/// Elapsed ticks from `start` to `now`, wrapping correctly across a
/// counter rollover.
pub const fn elapsed(now: Tick, start: Tick) -> Tick {
    now.wrapping_sub(start)
}

/// Read access to the free-running tick counter.
pub trait Clock {
    fn now(&self) -> Tick;
}

/// A one-shot deadline: `arm` schedules an expiry `ticks` from now;
/// `stop` disarms it. The deadline ISR is the sole source of MDB
/// timeout transitions (§4.5); this trait only covers arm/disarm, not
/// the callback itself, since the callback is wired at the interrupt
/// vector, not through a trait object.
pub trait DeadlineTimer {
    fn arm(&mut self, ticks: Tick);
    fn stop(&mut self);
    fn is_armed(&self) -> bool;
}

#[cfg(target_arch = "avr")]
pub mod avr {
    use core::cell::Cell;

    use avr_device::interrupt::Mutex;

    use super::{Clock, DeadlineTimer, Tick};

    /// Incremented by the TIMER0 COMPA ISR every 10 µs (prescale 8, CTC,
    /// OCR0A = 19 at 16 MHz: 16e6 / 8 / (19+1) = 100 kHz = 10 µs period).
    static TICKS: Mutex<Cell<Tick>> = Mutex::new(Cell::new(0));

    /// Called from the TIMER0 COMPA vector in `src/isr.rs`.
    pub fn on_tick_interrupt(cs: avr_device::interrupt::CriticalSection) {
        let cell = TICKS.borrow(cs);
        cell.set(cell.get().wrapping_add(1));
    }

    pub struct HardwareClock;

    impl Clock for HardwareClock {
        fn now(&self) -> Tick {
            avr_device::interrupt::free(|cs| TICKS.borrow(cs).get())
        }
    }

    /// TIMER1, 16-bit, used purely as a one-shot: CTC mode, prescale 8
    /// (same tick unit as TIMER0), OCR1A loaded with the deadline and
    /// the counter reset to 0 on arm. `timer_set(ms_to_ticks(6))`
    /// resolves to single-tick (10 µs) granularity, comfortably under
    /// the spec's "~100 µs resolution" requirement.
    pub struct HardwareDeadline {
        armed: bool,
    }

    impl HardwareDeadline {
        pub const fn new() -> Self {
            Self { armed: false }
        }
    }

    impl DeadlineTimer for HardwareDeadline {
        fn arm(&mut self, ticks: Tick) {
            let peripherals = unsafe { avr_device::atmega328p::Peripherals::steal() };
            let tc1 = &peripherals.TC1;
            tc1.tccr1b.write(|w| w.cs1().no_clock());
            tc1.tcnt1.write(|w| unsafe { w.bits(0) });
            tc1.ocr1a.write(|w| unsafe { w.bits(ticks) });
            tc1.tifr1.write(|w| w.ocf1a().set_bit());
            tc1.timsk1.modify(|_, w| w.ocie1a().set_bit());
            tc1.tccr1b.write(|w| w.wgm1().bits(0b01).cs1().prescale_8());
            self.armed = true;
        }

        fn stop(&mut self) {
            let peripherals = unsafe { avr_device::atmega328p::Peripherals::steal() };
            let tc1 = &peripherals.TC1;
            tc1.timsk1.modify(|_, w| w.ocie1a().clear_bit());
            tc1.tccr1b.write(|w| w.cs1().no_clock());
            self.armed = false;
        }

        fn is_armed(&self) -> bool {
            self.armed
        }
    }
}

/// A controllable clock/timer pair for host-side unit and property
/// tests: advancing `now` and firing the deadline are both explicit
/// so tests can model arbitrary ISR interleavings (spec.md §8,
/// property-based target (c)).
#[cfg(any(test, not(target_arch = "avr")))]
pub mod sim {
    use super::{Clock, DeadlineTimer, Tick};

    #[derive(Default)]
    pub struct SimClock {
        now: Tick,
    }

    impl SimClock {
        pub fn advance(&mut self, ticks: Tick) {
            self.now = self.now.wrapping_add(ticks);
        }
    }

    impl Clock for SimClock {
        fn now(&self) -> Tick {
            self.now
        }
    }

    #[derive(Default)]
    pub struct SimDeadline {
        deadline: Option<Tick>,
    }

    impl SimDeadline {
        /// Returns true if `now` has reached or passed the armed
        /// deadline (tested with wrapping-safe elapsed arithmetic from
        /// the tick at which `arm` was called, passed in separately by
        /// the caller since this simulator doesn't know "now" itself).
        pub fn expired(&self, elapsed_since_arm: Tick, ticks: Tick) -> bool {
            self.deadline.is_some() && elapsed_since_arm >= ticks
        }
    }

    impl DeadlineTimer for SimDeadline {
        fn arm(&mut self, ticks: Tick) {
            self.deadline = Some(ticks);
        }

        fn stop(&mut self) {
            self.deadline = None;
        }

        fn is_armed(&self) -> bool {
            self.deadline.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_to_ticks_matches_byte_timeout() {
        assert_eq!(ms_to_ticks(6), 600);
    }

    #[test]
    fn elapsed_wraps_correctly() {
        assert_eq!(elapsed(5, 65530), 11);
        assert_eq!(elapsed(100, 50), 50);
    }
}

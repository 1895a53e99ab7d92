//! Board collaborators (§1 "Out of scope (external collaborators)").
//!
//! Everything here is a thin seam the core protocol engine calls
//! through; none of it is part of the MDB/host-framing logic itself.
//! Traits are monomorphized into `main.rs`'s concrete board type, never
//! boxed or dyn-dispatched — there is exactly one implementation per
//! target and no runtime polymorphism is needed.

use crate::clock::Tick;

/// The free-running 10 µs counter the core consumes (§1, §4.3). A
/// superset of `clock::Clock` in name only — kept separate so the core
/// modules depend on `clock::Clock` directly while `main.rs` wires a
/// single concrete clock into both roles.
pub trait BoardClock {
    fn now(&self) -> Tick;
}

/// The "response ready" edge line (§4.7, §6 "Side channels"): asserted
/// whenever a response is pending and the secondary bus is idle.
pub trait NotifyPin {
    fn set(&mut self, asserted: bool);
}

/// Optional status LED (§6). Not interpreted by the core; board-specific
/// blink patterns are out of scope.
pub trait StatusLed {
    fn set(&mut self, on: bool);
}

/// Stubbed configuration store for the `CONFIG` command (§4.6, Open
/// Questions: "`CONFIG` command body format is reserved"). No
/// implementation in this core reads or writes through it; it exists so
/// a future board layer has a seam to land on.
pub trait ConfigStore {
    fn read(&self, key: u8) -> Option<u8>;
    fn write(&mut self, key: u8, value: u8) -> bool;
}

/// Firmware self-flash (§1, `FLASH=0x05`). Not implemented in this
/// core; the command replies `NOT_IMPLEMENTED` unconditionally.
pub trait FlashUpdater {
    fn begin_update(&mut self) -> bool;
}

/// Hardware watchdog (§5 "Blocking"): kicked once per main-loop
/// iteration; a missed kick is an unrecoverable soft reset.
pub trait Watchdog {
    fn kick(&mut self);
    fn trigger_reboot(&mut self) -> !;
}

/// Opportunistic single-byte packets from a keypad sharing the
/// secondary bus (§1, §4.6 "keypad passthrough"). The core only needs
/// to know whether the inbound byte should be treated as keypad data
/// versus a framed request — which `host::request::parse` already
/// decides from length alone — so this trait is a pass-through seam for
/// whatever the board layer does with `FIELD_TWI_DATA` once it has been
/// placed in a response, not a decision point in the core itself.
pub trait KeypadPassthrough {
    fn on_byte(&mut self, byte: u8);
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifyPin {
        pub asserted: bool,
        pub transitions: u8,
    }

    impl NotifyPin for RecordingNotifyPin {
        fn set(&mut self, asserted: bool) {
            if asserted != self.asserted {
                self.transitions += 1;
            }
            self.asserted = asserted;
        }
    }

    #[derive(Default)]
    pub struct RecordingWatchdog {
        pub kicks: u32,
    }

    impl Watchdog for RecordingWatchdog {
        fn kick(&mut self) {
            self.kicks += 1;
        }

        fn trigger_reboot(&mut self) -> ! {
            panic!("reboot requested in test harness");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn notify_pin_counts_only_real_transitions() {
        let mut pin = RecordingNotifyPin::default();
        pin.set(true);
        pin.set(true);
        pin.set(false);
        assert_eq!(pin.transitions, 2);
    }

    #[test]
    fn watchdog_counts_kicks() {
        let mut wd = RecordingWatchdog::default();
        wd.kick();
        wd.kick();
        assert_eq!(wd.kicks, 2);
    }
}

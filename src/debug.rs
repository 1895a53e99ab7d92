//! Deferred debug log: an ISR never blocks on a UART write, so log
//! lines are pushed into a fixed-capacity ring and only drained when
//! the host issues the `DEBUG` command (§4.6). Grounded on Hermit's
//! kernel message buffer (a fixed `[u8; N]` with a monotonic write
//! cursor, read back out-of-band rather than streamed).
//!
//! Unlike Hermit's version this ring is read destructively by a single
//! consumer (the main loop, never an ISR), so it needs no atomics —
//! pushes from an ISR and the drain from the main loop are already
//! serialized by the same critical-section discipline used everywhere
//! else shared state crosses that boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    const fn tag(self) -> &'static str {
        match self {
            LogLevel::Error => "E",
            LogLevel::Warn => "W",
            LogLevel::Info => "I",
            LogLevel::Debug => "D",
        }
    }
}

/// A fixed-capacity ring of log bytes. Overwrites the oldest bytes
/// once full rather than rejecting new ones — losing the tail of a
/// flood of debug spam is preferable to an ISR blocking or an append
/// silently failing mid-line.
pub struct LogBuffer<const N: usize> {
    data: [u8; N],
    /// Next write position, monotonically increasing mod `N`.
    head: usize,
    /// Total bytes ever written, capped at `N` once the ring has
    /// wrapped once; lets `drain` know how much of `data` is valid
    /// before the first wrap.
    filled: usize,
}

impl<const N: usize> LogBuffer<N> {
    pub const fn new() -> Self {
        Self { data: [0; N], head: 0, filled: 0 }
    }

    fn push_byte(&mut self, byte: u8) {
        self.data[self.head] = byte;
        self.head = (self.head + 1) % N;
        if self.filled < N {
            self.filled += 1;
        }
    }

    pub fn push_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.push_byte(b);
        }
    }

    pub fn log(&mut self, level: LogLevel, s: &str) {
        self.push_str(level.tag());
        self.push_byte(b':');
        self.push_str(s);
        self.push_byte(b'\n');
    }

    /// Copies the buffer's contents, oldest byte first, into `dest`,
    /// returning how many bytes were copied (`min(filled, dest.len())`,
    /// taking the most recent bytes if `dest` is shorter). Does not
    /// clear the ring — a subsequent `DEBUG` request sees the same
    /// history plus whatever was logged since, matching "flush" rather
    /// than "destructive pop" at the wire level.
    pub fn drain_into(&self, dest: &mut [u8]) -> usize {
        let n = self.filled.min(dest.len());
        let start = if self.filled < N {
            0
        } else {
            self.head
        };
        for i in 0..n {
            let src_index = (start + self.filled - n + i) % N;
            dest[i] = self.data[src_index];
        }
        n
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A `ufmt::uWrite` sink that appends into a `LogBuffer`, so the
/// `log_*!` macros below can use `uwrite!`'s formatting machinery
/// without an intermediate heap-allocated string.
pub struct LogWriter<'a, const N: usize> {
    pub level: LogLevel,
    pub buf: &'a mut LogBuffer<N>,
}

impl<'a, const N: usize> ufmt::uWrite for LogWriter<'a, N> {
    type Error = core::convert::Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.buf.push_str(s);
        Ok(())
    }
}

#[macro_export]
macro_rules! log_error {
    ($buf:expr, $($arg:tt)*) => {{
        let mut w = $crate::debug::LogWriter { level: $crate::debug::LogLevel::Error, buf: $buf };
        w.buf.push_str("E:");
        let _ = ufmt::uwrite!(w, $($arg)*);
        w.buf.push_byte(b'\n');
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($buf:expr, $($arg:tt)*) => {{
        let mut w = $crate::debug::LogWriter { level: $crate::debug::LogLevel::Warn, buf: $buf };
        w.buf.push_str("W:");
        let _ = ufmt::uwrite!(w, $($arg)*);
        w.buf.push_byte(b'\n');
    }};
}

#[macro_export]
macro_rules! log_info {
    ($buf:expr, $($arg:tt)*) => {{
        let mut w = $crate::debug::LogWriter { level: $crate::debug::LogLevel::Info, buf: $buf };
        w.buf.push_str("I:");
        let _ = ufmt::uwrite!(w, $($arg)*);
        w.buf.push_byte(b'\n');
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($buf:expr, $($arg:tt)*) => {{
        let mut w = $crate::debug::LogWriter { level: $crate::debug::LogLevel::Debug, buf: $buf };
        w.buf.push_str("D:");
        let _ = ufmt::uwrite!(w, $($arg)*);
        w.buf.push_byte(b'\n');
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain_round_trips_when_under_capacity() {
        let mut buf: LogBuffer<16> = LogBuffer::new();
        buf.push_str("hi");
        let mut out = [0u8; 16];
        let n = buf.drain_into(&mut out);
        assert_eq!(&out[..n], b"hi");
    }

    #[test]
    fn wraps_and_keeps_most_recent_bytes() {
        let mut buf: LogBuffer<4> = LogBuffer::new();
        buf.push_str("abcdef");
        let mut out = [0u8; 4];
        let n = buf.drain_into(&mut out);
        assert_eq!(&out[..n], b"cdef");
    }

    #[test]
    fn drain_respects_a_shorter_destination() {
        let mut buf: LogBuffer<8> = LogBuffer::new();
        buf.push_str("abcd");
        let mut out = [0u8; 2];
        let n = buf.drain_into(&mut out);
        assert_eq!(n, 2);
        assert_eq!(&out[..n], b"cd");
    }

    #[test]
    fn log_macro_prefixes_level_tag() {
        let mut buf: LogBuffer<32> = LogBuffer::new();
        crate::log_info!(&mut buf, "val={}", 7u8);
        let mut out = [0u8; 32];
        let n = buf.drain_into(&mut out);
        assert_eq!(&out[..n], b"I:val=7\n");
    }
}

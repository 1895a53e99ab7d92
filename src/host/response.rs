//! Response assembly (§4.6 "Response assembly"). A response is never
//! observed half-built: the CRC byte is the last thing written, and the
//! secondary-bus driver only looks at the outbound buffer after a
//! separate "filled" publish (handled one layer up, in
//! `src/secondary_bus.rs`).

use crate::buffer::ByteBuffer;
use crate::crc::crc8_span;
use crate::host::fields::{error_code, CLOCK10U, ERROR2, FIRMWARE_VERSION};
use crate::host::packet::HOST_FRAME_MAX;

pub type ResponseBuffer = ByteBuffer<HOST_FRAME_MAX>;

/// Bytes reserved for a possible truncate-to-overflow field (`ERROR2`,
/// 2-byte payload => tag+len+2 = 4 bytes) plus the trailing CRC byte.
const OVERFLOW_RESERVE: usize = 5;

pub struct ResponseBuilder<'a> {
    buf: &'a mut ResponseBuffer,
    /// Length of the buffer right after the mandatory prefix fields are
    /// written. An overflow truncates back to this point before adding
    /// the single `ERROR2` field — optional fields already appended
    /// before the overflow are discarded, not just left in place.
    prefix_len: usize,
    closed: bool,
}

impl<'a> ResponseBuilder<'a> {
    /// Writes the placeholder length, `request_id`, `header`, and the
    /// two mandatory prefix fields.
    pub fn begin(buf: &'a mut ResponseBuffer, request_id: u8, header: u8, firmware_version: (u8, u8), clock: u16) -> Self {
        buf.clear_fast();
        let _ = buf.append(0); // length placeholder, patched in finish()
        let _ = buf.append(request_id);
        let _ = buf.append(header);
        let mut builder = Self { buf, prefix_len: 0, closed: false };
        builder.field(FIRMWARE_VERSION, &[firmware_version.0, firmware_version.1]);
        builder.field(CLOCK10U, &clock.to_be_bytes());
        builder.prefix_len = builder.buf.len();
        builder
    }

    /// Appends one typed field, truncating to a single overflow-error
    /// field if it would not fit (§4.6 / §7 "Capacity").
    pub fn field(&mut self, tag: u8, bytes: &[u8]) -> &mut Self {
        if self.closed {
            return self;
        }
        let needed = 2 + bytes.len();
        if self.buf.len() + needed > self.buf.capacity().saturating_sub(OVERFLOW_RESERVE) {
            self.close_with_overflow(needed);
            return self;
        }
        let _ = self.buf.append(tag);
        let _ = self.buf.append(bytes.len() as u8);
        let _ = self.buf.append_n(bytes);
        self
    }

    pub fn field1(&mut self, tag: u8, b: u8) -> &mut Self {
        self.field(tag, &[b])
    }

    pub fn field2(&mut self, tag: u8, a: u8, b: u8) -> &mut Self {
        self.field(tag, &[a, b])
    }

    fn close_with_overflow(&mut self, attempted_length: usize) {
        // Discard any optional fields appended so far, truncating back
        // to just the mandatory prefix, then add a single
        // ERROR2(BUFFER_OVERFLOW, attempted) field — never a partial
        // field and never a mix of optional fields plus the error.
        self.buf.truncate(self.prefix_len);
        self.field_force(ERROR2, &[error_code::BUFFER_OVERFLOW, attempted_length.min(255) as u8]);
        self.closed = true;
    }

    fn field_force(&mut self, tag: u8, bytes: &[u8]) {
        let _ = self.buf.append(tag);
        let _ = self.buf.append(bytes.len() as u8);
        let _ = self.buf.append_n(bytes);
    }

    /// Patches `length`, computes the CRC over `[0, length-1)`, appends
    /// it. Returns the finished length.
    pub fn finish(self) -> usize {
        let len = self.buf.len() + 1;
        self.buf.as_mut_slice()[0] = len as u8;
        let crc = crc8_span(self.buf.as_slice());
        let _ = self.buf.append(crc);
        self.buf.len()
    }
}

/// Builds a plain `RESPONSE_ERROR` frame with a single `ERROR2` field —
/// used for frame-level rejects that never reach field-by-field
/// assembly (§7 "Frame-level").
pub fn build_error2(
    buf: &mut ResponseBuffer,
    request_id: u8,
    firmware_version: (u8, u8),
    clock: u16,
    code: u8,
    arg: u8,
) -> usize {
    let mut b = ResponseBuilder::begin(buf, request_id, crate::host::fields::response_header::ERROR, firmware_version, clock);
    b.field2(ERROR2, code, arg);
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc8_span;

    #[test]
    fn basic_response_round_trip_has_valid_crc() {
        let mut buf = ResponseBuffer::new();
        let mut b = ResponseBuilder::begin(&mut buf, 1, crate::host::fields::response_header::OK, (1, 0), 42);
        b.field1(crate::host::fields::MCUSR, 0x03);
        let len = b.finish();
        let slice = buf.as_slice();
        assert_eq!(slice.len(), len);
        assert_eq!(slice[0], len as u8);
        assert_eq!(slice[1], 1);
        assert_eq!(crc8_span(&slice[..len - 1]), slice[len - 1]);
    }

    #[test]
    fn overflowing_fields_converge_to_single_error2() {
        let mut buf = ResponseBuffer::new();
        let mut b = ResponseBuilder::begin(&mut buf, 1, crate::host::fields::response_header::OK, (1, 0), 0);
        // Push fields well past capacity.
        for i in 0..40u8 {
            b.field1(crate::host::fields::ERRORN, i);
        }
        let len = b.finish();
        let slice = buf.as_slice();
        // Mandatory prefix fields (firmware version, clock) plus exactly
        // one ERROR2 field and the CRC byte — no leftover ERRORN fields.
        assert_eq!(slice[3], FIRMWARE_VERSION);
        assert_eq!(slice[7], CLOCK10U);
        let tail_tag_index = 11;
        assert_eq!(slice[tail_tag_index], ERROR2);
        assert_eq!(slice[tail_tag_index + 1], 2);
        assert_eq!(slice[tail_tag_index + 2], error_code::BUFFER_OVERFLOW);
        assert_eq!(len, tail_tag_index + 2 + 1 + 1); // tag+len+2 bytes + crc
        assert!(slice[..tail_tag_index].iter().all(|&b| b != crate::host::fields::ERRORN));
    }
}

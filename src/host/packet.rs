//! Request/response frame layout shared by the two host-framing modules
//! (§3 "Packet (on the wire, host side)", §6 "External interfaces").

/// Largest legal frame in either direction. §9 "No dynamic allocation".
pub const HOST_FRAME_MAX: usize = 70;

/// Smallest legal request: `length | request_id | command | crc8`, no
/// payload.
pub const MIN_REQUEST_LEN: usize = 4;

/// Offset of the `length` byte (also its own value).
pub const OFF_LENGTH: usize = 0;
/// Offset of `request_id`.
pub const OFF_REQUEST_ID: usize = 1;
/// Offset of `command` (request side) / `response` (response side).
pub const OFF_COMMAND: usize = 2;
/// Offset at which the payload/field section begins.
pub const OFF_PAYLOAD: usize = 3;

/// `request_id == 0` is reserved and always rejected.
pub const INVALID_REQUEST_ID: u8 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_constants_match_spec_offsets() {
        assert_eq!(OFF_LENGTH, 0);
        assert_eq!(OFF_REQUEST_ID, 1);
        assert_eq!(OFF_COMMAND, 2);
        assert_eq!(OFF_PAYLOAD, 3);
        assert_eq!(MIN_REQUEST_LEN, 4);
    }
}

//! Request parsing (§4.6 "Request parsing").
//!
//! Parsing never touches response assembly; callers turn a `FrameError`
//! into a wire response via `response::build_error2`.

use crate::crc::crc8_span;
use crate::host::fields::error_code;
use crate::host::packet::{INVALID_REQUEST_ID, MIN_REQUEST_LEN, OFF_COMMAND, OFF_PAYLOAD, OFF_REQUEST_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// `length < 4` or `length > inbound.length`.
    FrameLength,
    /// CRC mismatch; carries the CRC actually computed over the frame.
    InvalidCrc(u8),
    /// `request_id == 0`.
    InvalidId,
}

impl FrameError {
    pub const fn code(self) -> u8 {
        match self {
            FrameError::FrameLength => error_code::FRAME_LENGTH,
            FrameError::InvalidCrc(_) => error_code::INVALID_CRC,
            FrameError::InvalidId => error_code::INVALID_ID,
        }
    }

    pub const fn arg(self) -> u8 {
        match self {
            FrameError::InvalidCrc(crc) => crc,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedRequest<'a> {
    /// The inbound buffer held exactly one opportunistic byte from a
    /// keypad sharing the secondary bus — not a framed request at all.
    KeypadByte(u8),
    Frame { request_id: u8, command: u8, payload: &'a [u8] },
}

/// Parses the contents of the inbound buffer after a completed
/// secondary-bus session (`idle == true`). `raw` is the buffer's used
/// portion, i.e. exactly the bytes the host wrote.
pub fn parse(raw: &[u8]) -> Result<ParsedRequest<'_>, FrameError> {
    if raw.len() == 1 {
        return Ok(ParsedRequest::KeypadByte(raw[0]));
    }
    let length = *raw.first().ok_or(FrameError::FrameLength)? as usize;
    if length < MIN_REQUEST_LEN || length > raw.len() {
        return Err(FrameError::FrameLength);
    }
    let frame = &raw[..length];
    let computed = crc8_span(&frame[..length - 1]);
    let received = frame[length - 1];
    if computed != received {
        return Err(FrameError::InvalidCrc(computed));
    }
    let request_id = frame[OFF_REQUEST_ID];
    if request_id == INVALID_REQUEST_ID {
        return Err(FrameError::InvalidId);
    }
    let command = frame[OFF_COMMAND];
    let payload = &frame[OFF_PAYLOAD..length - 1];
    Ok(ParsedRequest::Frame { request_id, command, payload })
}

//! Control-byte escaping and checksums
//!
//! Four bytes have framing meaning and may never appear raw inside a
//! payload. Each is sent as `}` followed by the byte XOR 0x20.

use vsp_core::{VspError, VspResult};

/// Start of frame
pub const FRAME_START: u8 = b'$';
/// End of payload, followed by two hex checksum digits
pub const FRAME_END: u8 = b'#';
/// Reserved
pub const FRAME_REPEAT: u8 = b'*';
/// Escape marker
pub const ESCAPE: u8 = b'}';
/// Value XORed into an escaped byte
pub const ESCAPE_XOR: u8 = 0x20;

/// Positive acknowledgement
pub const ACK: u8 = b'+';
/// Negative acknowledgement, asks the sender to retransmit
pub const NAK: u8 = b'-';

#[inline]
pub fn is_control(byte: u8) -> bool {
    matches!(byte, FRAME_START | FRAME_END | FRAME_REPEAT | ESCAPE)
}

/// Escape every control byte in `payload`
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 8);
    for &byte in payload {
        if is_control(byte) {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
    out
}

/// Reverse of [`escape`]
pub fn unescape(escaped: &[u8]) -> VspResult<Vec<u8>> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut bytes = escaped.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            let next = bytes
                .next()
                .ok_or_else(|| VspError::Malformed("dangling escape marker".into()))?;
            out.push(next ^ ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

/// Sum of all bytes, mod 256
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

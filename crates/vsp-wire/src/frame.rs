//! Packet framing for the VSP wire protocol
//!
//! Frame = `$` + escaped payload + `#` + two hex digits
//!
//! The checksum covers the escaped payload bytes exactly as transmitted.

use bytes::{BufMut, Bytes, BytesMut};

use vsp_core::{VspError, VspResult};

use crate::{checksum, escape, ESCAPE, ESCAPE_XOR, FRAME_END, FRAME_START};

/// Largest payload a decoder accepts by default
pub const MAX_PAYLOAD_SIZE: usize = 10_000_000;

/// Build a complete frame for `payload`
pub fn encode_packet(payload: &[u8]) -> Bytes {
    let escaped = escape(payload);
    let mut buf = BytesMut::with_capacity(escaped.len() + 4);
    buf.put_u8(FRAME_START);
    buf.put_slice(&escaped);
    buf.put_u8(FRAME_END);
    buf.put_slice(format!("{:02x}", checksum(&escaped)).as_bytes());
    buf.freeze()
}

/// Outcome of feeding one byte into a [`PacketDecoder`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// Frame incomplete, keep feeding
    Pending,
    /// Frame complete and checksum valid
    Packet(Bytes),
    /// Frame complete but the checksum did not match
    Corrupt {
        /// Checksum sent by the peer, `None` if the digits were not hex
        expected: Option<u8>,
        /// Checksum computed over the received bytes
        actual: u8,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Waiting for `$`
    Idle,
    Payload,
    /// Previous byte was `}`
    Escape,
    /// Reading checksum digits, holding the first one once seen
    Checksum(Option<u8>),
}

/// Byte-at-a-time receive state machine
#[derive(Debug)]
pub struct PacketDecoder {
    state: State,
    buf: BytesMut,
    sum: u8,
    max_payload: usize,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_PAYLOAD_SIZE)
    }

    /// Create a decoder that rejects payloads longer than `max_payload`
    pub fn with_limit(max_payload: usize) -> Self {
        PacketDecoder {
            state: State::Idle,
            buf: BytesMut::new(),
            sum: 0,
            max_payload,
        }
    }

    /// True while a frame has been started but not finished
    pub fn in_frame(&self) -> bool {
        self.state != State::Idle
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buf.clear();
        self.sum = 0;
    }

    /// Feed one byte from the stream
    pub fn feed(&mut self, byte: u8) -> VspResult<Decoded> {
        match self.state {
            State::Idle => {
                if byte == FRAME_START {
                    self.reset();
                    self.state = State::Payload;
                }
                Ok(Decoded::Pending)
            }
            State::Payload => match byte {
                FRAME_START => {
                    self.reset();
                    self.state = State::Payload;
                    Ok(Decoded::Pending)
                }
                FRAME_END => {
                    self.state = State::Checksum(None);
                    Ok(Decoded::Pending)
                }
                ESCAPE => {
                    self.sum = self.sum.wrapping_add(byte);
                    self.state = State::Escape;
                    Ok(Decoded::Pending)
                }
                _ => {
                    self.sum = self.sum.wrapping_add(byte);
                    self.push(byte)
                }
            },
            State::Escape => {
                self.sum = self.sum.wrapping_add(byte);
                self.state = State::Payload;
                self.push(byte ^ ESCAPE_XOR)
            }
            State::Checksum(None) => {
                self.state = State::Checksum(Some(byte));
                Ok(Decoded::Pending)
            }
            State::Checksum(Some(hi)) => {
                let expected = hex_pair(hi, byte);
                let actual = self.sum;
                let payload = self.buf.split().freeze();
                self.reset();

                if expected == Some(actual) {
                    Ok(Decoded::Packet(payload))
                } else {
                    Ok(Decoded::Corrupt { expected, actual })
                }
            }
        }
    }

    fn push(&mut self, byte: u8) -> VspResult<Decoded> {
        self.buf.put_u8(byte);
        if self.buf.len() > self.max_payload {
            self.reset();
            return Err(VspError::Overflow {
                limit: self.max_payload,
            });
        }
        Ok(Decoded::Pending)
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(decoder: &mut PacketDecoder, bytes: &[u8]) -> Vec<Decoded> {
        bytes
            .iter()
            .map(|&b| decoder.feed(b).unwrap())
            .filter(|d| *d != Decoded::Pending)
            .collect()
    }

    #[test]
    fn test_encode_status() {
        assert_eq!(&encode_packet(b"status")[..], b"$status#a4");
    }

    #[test]
    fn test_encode_escapes_payload() {
        let frame = encode_packet(b"a#b");
        // 'a' + '}' + 0x03 + 'b' = 97 + 125 + 3 + 98 = 323 -> 0x43
        assert_eq!(&frame[..], b"$a}\x03b#43");
    }

    #[test]
    fn test_decode_valid_frame() {
        let mut decoder = PacketDecoder::new();
        let out = decode_all(&mut decoder, b"$OK,1,2#ee");
        // sum("OK,1,2") = 79+75+44+49+44+50 = 341 -> 0x55
        assert_eq!(
            out,
            vec![Decoded::Corrupt {
                expected: Some(0xee),
                actual: 0x55
            }]
        );

        let out = decode_all(&mut decoder, b"$OK,1,2#55");
        assert_eq!(out, vec![Decoded::Packet(Bytes::from_static(b"OK,1,2"))]);
    }

    #[test]
    fn test_decode_ignores_noise_before_start() {
        let mut decoder = PacketDecoder::new();
        let mut stream = b"+garbage".to_vec();
        stream.extend_from_slice(&encode_packet(b"OK"));
        let out = decode_all(&mut decoder, &stream);
        assert_eq!(out, vec![Decoded::Packet(Bytes::from_static(b"OK"))]);
    }

    #[test]
    fn test_decode_restart_on_start_byte() {
        let mut decoder = PacketDecoder::new();
        let mut stream = b"$half".to_vec();
        stream.extend_from_slice(&encode_packet(b"whole"));
        let out = decode_all(&mut decoder, &stream);
        assert_eq!(out, vec![Decoded::Packet(Bytes::from_static(b"whole"))]);
    }

    #[test]
    fn test_decode_non_hex_checksum_is_corrupt() {
        let mut decoder = PacketDecoder::new();
        let out = decode_all(&mut decoder, b"$OK#zz");
        assert!(matches!(out[0], Decoded::Corrupt { expected: None, .. }));
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_decode_overflow() {
        let mut decoder = PacketDecoder::with_limit(4);
        for &b in b"$abcd" {
            decoder.feed(b).unwrap();
        }
        let err = decoder.feed(b'e').unwrap_err();
        assert_eq!(err, VspError::Overflow { limit: 4 });
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_checksum_digits_case_insensitive() {
        let mut decoder = PacketDecoder::new();
        let out = decode_all(&mut decoder, b"$status#A4");
        assert_eq!(out, vec![Decoded::Packet(Bytes::from_static(b"status"))]);
    }

    proptest! {
        #[test]
        fn prop_encode_decode(payload in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut decoder = PacketDecoder::new();
            let frame = encode_packet(&payload);
            let out = decode_all(&mut decoder, &frame);
            prop_assert_eq!(out, vec![Decoded::Packet(Bytes::from(payload))]);
        }

        #[test]
        fn prop_corrupted_frame_detected(
            payload in prop::collection::vec(b'a'..=b'z', 1..128),
            index in any::<prop::sample::Index>(),
            replacement in b'a'..=b'z',
        ) {
            let frame = encode_packet(&payload).to_vec();
            // Only touch payload bytes, never the framing
            let i = 1 + index.index(frame.len() - 4);
            prop_assume!(frame[i] != replacement);

            let mut corrupted = frame.clone();
            corrupted[i] = replacement;

            let mut decoder = PacketDecoder::new();
            let out = decode_all(&mut decoder, &corrupted);
            prop_assert_eq!(out.len(), 1);
            prop_assert!(matches!(out[0], Decoded::Corrupt { .. }), "corruption detected");
        }
    }
}

//! Fault injection for the mock simulator
//!
//! Faults are counted, not random: a test asks for exactly `n` rejected or
//! corrupted frames and can then assert on the client's retry behavior.

/// Frame-level faults the peer injects before behaving normally
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Incoming command frames answered with NAK instead of ACK
    pub nak_commands: usize,
    /// Outgoing reply frames sent with a wrong checksum
    pub corrupt_replies: usize,
}

impl FaultConfig {
    /// No faults
    pub fn clean() -> Self {
        Self::default()
    }

    /// A couple of recoverable faults in each direction
    pub fn noisy() -> Self {
        FaultConfig {
            nak_commands: 2,
            corrupt_replies: 2,
        }
    }

    /// More faults than the client's default retry budget absorbs
    pub fn hostile() -> Self {
        FaultConfig {
            nak_commands: 5,
            corrupt_replies: 5,
        }
    }

    /// Consume one pending NAK
    pub fn take_nak(&mut self) -> bool {
        take(&mut self.nak_commands)
    }

    /// Consume one pending corruption
    pub fn take_corruption(&mut self) -> bool {
        take(&mut self.corrupt_replies)
    }
}

fn take(counter: &mut usize) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

/// Flip the last checksum digit of an encoded frame
pub fn corrupt_frame(frame: &[u8]) -> Vec<u8> {
    let mut out = frame.to_vec();
    if let Some(last) = out.last_mut() {
        *last = if *last == b'0' { b'1' } else { b'0' };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsp_wire::{encode_packet, Decoded, PacketDecoder};

    #[test]
    fn test_counters_drain() {
        let mut faults = FaultConfig::noisy();
        assert!(faults.take_nak());
        assert!(faults.take_nak());
        assert!(!faults.take_nak());
        assert_eq!(faults.corrupt_replies, 2);
        assert!(!FaultConfig::clean().take_corruption());
    }

    #[test]
    fn test_corrupt_frame_fails_checksum() {
        let frame = encode_packet(b"OK,running,0,0");
        let mut decoder = PacketDecoder::new();
        let mut last = Decoded::Pending;
        for &b in corrupt_frame(&frame).iter() {
            last = decoder.feed(b).unwrap();
        }
        assert!(matches!(last, Decoded::Corrupt { .. }));
    }
}

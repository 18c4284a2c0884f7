#![no_main]

use libfuzzer_sys::fuzz_target;
use vsp_wire::{encode_packet, Decoded, PacketDecoder};

// Arbitrary bytes never panic the decoder, and every packet it yields
// re-encodes to a frame it accepts again.
fuzz_target!(|data: &[u8]| {
    let mut decoder = PacketDecoder::with_limit(4096);
    for &byte in data {
        if let Ok(Decoded::Packet(payload)) = decoder.feed(byte) {
            let mut again = PacketDecoder::new();
            let mut last = Decoded::Pending;
            for &b in encode_packet(&payload).iter() {
                last = again.feed(b).expect("re-encoded frame within limit");
            }
            assert_eq!(last, Decoded::Packet(payload));
        }
    }
});

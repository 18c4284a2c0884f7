#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vsp_wire::{compose, decompose, parse_response};

#[derive(Arbitrary, Debug)]
struct Input {
    fields: Vec<String>,
    raw: String,
}

fuzz_target!(|input: Input| {
    if !input.fields.is_empty() {
        assert_eq!(decompose(&compose(&input.fields)), input.fields);
    }
    let _ = parse_response(&input.raw);
});

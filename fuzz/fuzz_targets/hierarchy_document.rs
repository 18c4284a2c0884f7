#![no_main]

use libfuzzer_sys::fuzz_target;
use vsp_session::HierarchyDocument;

fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        let _ = HierarchyDocument::parse(xml);
    }
});

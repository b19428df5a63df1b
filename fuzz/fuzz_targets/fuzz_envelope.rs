#![no_main]

use keyward::rotation::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing must never panic, and anything it accepts must re-encode to the same bytes
    if let Ok(envelope) = Envelope::from_bytes(data) {
        let encoded = envelope.to_bytes().expect("parsed envelope re-encodes");
        assert_eq!(encoded, data);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Envelope::from_json(text);
    }
});

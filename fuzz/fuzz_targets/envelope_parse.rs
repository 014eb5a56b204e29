#![no_main]

use libfuzzer_sys::fuzz_target;
use morphcast_wire::Envelope;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(envelope) = Envelope::parse(text) {
        // Anything we accept must serialize and parse back to itself
        let json = envelope.to_json().expect("accepted envelope must serialize");
        let again = Envelope::parse(&json).expect("serialized envelope must parse");
        assert_eq!(again.message_type(), envelope.message_type());
    }
});

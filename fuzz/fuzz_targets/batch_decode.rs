#![no_main]

use libfuzzer_sys::fuzz_target;
use morphcast_codec::{BatchDecoder, BatchEncoder, DeltaDecompressor};

fuzz_target!(|data: &[u8]| {
    if let Ok(units) = BatchDecoder::decode(data) {
        let encoded = BatchEncoder::encode(&units).expect("decoded units must encode");
        assert_eq!(BatchDecoder::decode(&encoded).expect("re-decode"), units);
    }

    // The decoder must never panic, whatever arrives
    let mut decoder = DeltaDecompressor::new();
    let _ = decoder.decompress_batch(data);
    let _ = decoder.interpolate_at(0.5);
});

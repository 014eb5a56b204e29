#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use morphcast_codec::{DeltaCompressor, DeltaDecompressor};
use morphcast_core::{MorphFrame, MorphId};

#[derive(Debug, Arbitrary)]
struct Input {
    frames: Vec<Vec<(u8, u16)>>,
}

fuzz_target!(|input: Input| {
    let mut encoder = DeltaCompressor::new();
    let mut decoder = DeltaDecompressor::new();
    for (i, entries) in input.frames.iter().take(64).enumerate() {
        let frame: MorphFrame = entries
            .iter()
            .filter_map(|(id, v)| {
                MorphId::from_index(u16::from(*id)).map(|m| (m.name(), f64::from(*v) / 65535.0))
            })
            .collect();
        let unit = encoder.compress_unit(&frame, i as f64 / 60.0);
        let outcome = decoder.decompress_frame(&unit);
        assert!(outcome.is_applied());
    }
});

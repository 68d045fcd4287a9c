#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail, never panic.
    if let Ok(graph) = carve_codec::decode_graph(data) {
        let _ = carve_codec::encode_graph(&graph);
    }
});

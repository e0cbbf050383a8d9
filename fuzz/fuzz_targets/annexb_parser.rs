#![no_main]

use esmux_core::{make_parser, CodecConfig, ExternalTiming};
use libfuzzer_sys::fuzz_target;

/// Drives the AVC Annex-B parser over arbitrary bytes; the only property
/// under test is "never panics", same as the original AFL harness this
/// replaces.
fuzz_target!(|data: &[u8]| {
    let Ok(mut parser) = make_parser("avc") else { return };
    if parser.init(CodecConfig::default(), ExternalTiming::default()).is_err() {
        return;
    }
    let _ = parser.feed(data);
    parser.finish();
    while let Ok(Some(_sample)) = parser.get_sample() {}
});

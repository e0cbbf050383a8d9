#![no_main]

use esmux_core::ac4::toc::parse_toc;
use libfuzzer_sys::fuzz_target;

/// Drives `ac4_toc()` parsing directly over arbitrary bytes, independent of
/// sync-frame scanning: the TOC's escape-continued `variable_bits` fields
/// and nested presentation/substream-group loops are the densest part of
/// the AC-4 bitstream grammar and the most likely place for a malformed
/// stream to drive an out-of-bounds read or infinite loop.
fuzz_target!(|data: &[u8]| {
    let mut reader = esmux_core::bitreader::BitReader::new(data);
    let _ = parse_toc(&mut reader);
});

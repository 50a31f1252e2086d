#![no_main]

use abcpatch::abc::AbcFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(unit) = AbcFile::parse(data) {
        let _ = unit.to_bytes();
    }
});

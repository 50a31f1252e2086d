#![no_main]

use abcpatch::Movie;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = Movie::from_mem(data.to_vec());
});

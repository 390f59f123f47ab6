//! Fuzz target for package archive parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the archive reader,
//! checking for panics, crashes, or hangs.

#![no_main]

use cortexpack::package::Package;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = Package::from_bytes(data);
});

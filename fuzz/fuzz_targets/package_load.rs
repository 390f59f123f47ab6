//! Fuzz target for rebuilding a dataset from a parsed package.
//!
//! Archives that parse are turned into datasets, exercising view, data
//! and stray entry decoding.

#![no_main]

use cortexpack::package::Package;
use cortexpack::Dataset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(package) = Package::from_bytes(data) {
        let _ = Dataset::from_package(package, None);
    }
});

#![no_main]
use std::rc::Rc;

use jodec::{DecodeOptions, Decoder, TypeRegistry};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Limits halten feindliche Laengenangaben vom Allokator fern
    let options = DecodeOptions::new()
        .with_max_string_length(1 << 16)
        .with_max_array_length(1 << 16)
        .with_max_depth(128);
    let Ok(mut dec) = Decoder::with_options(data, Rc::new(TypeRegistry::lenient()), options)
    else {
        return;
    };
    for _ in 0..16 {
        if dec.read_object().is_err() {
            break;
        }
    }
});

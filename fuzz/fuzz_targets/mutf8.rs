#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = jodec::mutf8::decode(data);
    // Jeder gueltige String muss durch encode/decode unveraendert gehen
    if let Ok(s) = std::str::from_utf8(data) {
        let decoded = jodec::mutf8::decode(&jodec::mutf8::encode(s)).unwrap();
        assert_eq!(decoded, s);
    }
});

#![no_main]
use jodec::stream::BlockInput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut bin = BlockInput::new(data);
    bin.set_block_mode(true);
    let mut buf = [0u8; 64];
    loop {
        match bin.read_into(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
});

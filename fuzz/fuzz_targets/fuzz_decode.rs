#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_protocol::core::codec;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic; whatever decodes must re-encode identically
    if let Ok((message, used)) = codec::decode(data) {
        let bytes = codec::to_bytes(&message);
        assert_eq!(&bytes[..], &data[..used]);
    }
});

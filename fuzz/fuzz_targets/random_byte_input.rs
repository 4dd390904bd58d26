#![no_main]

use libfuzzer_sys::fuzz_target;
use ubem::BemDef;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = BemDef::from_json_str(json);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Malformed filters must surface as errors, never panics.
        if let Ok(spec) = montylite::cli::parse_json_document(s) {
            let _ = montylite::engine::compile_filter(&spec);
        }
    }
});

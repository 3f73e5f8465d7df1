#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(spec) = montylite::cli::parse_json_document(s) {
            if let Ok(updator) = montylite::engine::compile_update(&spec, &[]) {
                let mut m = montylite::engine::Match::bare(bson::doc! {
                    "_id": 1, "a": [1, 2, {"b": 3}], "n": {"x": 1.5}, "s": "text"
                });
                let _ = updator.apply(&mut m, false);
            }
        }
    }
});

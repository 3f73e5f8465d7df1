#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        let Ok(spec) = montylite::cli::parse_json_document(s) else { return };
        let Ok(filter) = montylite::engine::compile_filter(&spec) else { return };
        let projector = montylite::engine::compile_projection(&bson::doc! {"a.$": 1}, &filter).ok();
        // A tiny set of documents touching arrays, nesting and nulls
        let docs = [
            bson::doc! {"a": 1, "b": 2, "name": "x"},
            bson::doc! {"a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
            bson::doc! {"a": [1, [2, 3], {"c": null}], "active": true},
            bson::doc! {"a": null},
        ];
        for d in &docs {
            if let (Some(m), Some(p)) = (filter.evaluate(d), projector.as_ref()) {
                let _ = montylite::engine::apply_projection(p, &m);
            }
        }
    }
});

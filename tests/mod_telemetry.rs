use std::sync::Arc;

use bson::doc;
use montylite::query::telemetry;
use montylite::{FindOptions, MontyClient, UpdateOptions};
use parking_lot::RwLock;

#[test]
fn query_log_writes_structured_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("queries.log");
    telemetry::set_query_log(log_path.clone(), Some(true));
    let col = MontyClient::memory().database("tele").unwrap().collection("q").unwrap();
    col.insert_one(doc! {"_id": 1}).unwrap();
    let _ = col.find(&doc! {"_id": 1}, FindOptions::default()).unwrap().to_vec().unwrap();
    let text = std::fs::read_to_string(&log_path).unwrap();
    let found = text.lines().filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok()).any(|v| {
        v["ns"] == "tele.q" && v["returned"] == 1 && v["filter_hash"].as_str().is_some_and(|h| h.len() == 64)
    });
    assert!(found, "{text}");
}

#[test]
fn audit_sink_sees_writes() {
    let sink = Arc::new(RwLock::new(Vec::new()));
    telemetry::set_audit_sink_for_tests(sink.clone());
    telemetry::set_audit_enabled(true);
    let col = MontyClient::memory().database("tele").unwrap().collection("audit").unwrap();
    col.insert_one(doc! {"_id": "who"}).unwrap();
    col.delete_one(&doc! {"_id": "who"}).unwrap();
    let lines = sink.read().clone();
    assert!(lines.iter().any(|l| l.contains("\"op\":\"insert\"") && l.contains("tele.audit")));
    assert!(lines.iter().any(|l| l.contains("\"op\":\"delete\"")));
}

#[test]
fn metrics_text_lists_counters() {
    let col = MontyClient::memory().database("tele").unwrap().collection("m").unwrap();
    col.insert_one(doc! {}).unwrap();
    let text = telemetry::metrics_text();
    for name in ["montylite_queries_total", "montylite_writes_total", "montylite_timeouts_total"] {
        assert!(text.contains(name), "{text}");
    }
    let writes: u64 = text
        .lines()
        .find_map(|l| l.strip_prefix("montylite_writes_total "))
        .and_then(|n| n.trim().parse().ok())
        .unwrap();
    assert!(writes >= 1);
    telemetry::emit_metrics();
}

#[test]
fn operations_record_phase_timings() {
    use montylite::utils::devlog;
    let _g = devlog::capture();
    let col = MontyClient::memory().database("tele").unwrap().collection("timed").unwrap();
    col.insert_many(vec![doc! {"_id": 1, "a": 2}, doc! {"_id": 2, "a": 1}], true).unwrap();
    let opts = FindOptions { sort: Some(doc! {"a": 1}), ..FindOptions::default() };
    assert_eq!(col.find(&doc! {}, opts).unwrap().to_vec().unwrap().len(), 2);
    col.update_one(&doc! {"_id": 1}, &doc! {"$inc": {"a": 1}}, UpdateOptions::default()).unwrap();

    let records = devlog::take_captured();
    let phases = |op: &str| -> Vec<String> {
        let rec = records.iter().find(|r| r["op"] == op).unwrap_or_else(|| panic!("no {op} record"));
        assert_eq!(rec["ns"], "tele.timed");
        rec["phases"].as_object().unwrap().keys().cloned().collect()
    };
    let find = phases("find");
    assert!(["scan", "sort", "project"].iter().all(|p| find.iter().any(|k| k == p)), "{find:?}");
    let update = phases("update_one");
    assert!(["compile", "scan", "apply", "write"].iter().all(|p| update.iter().any(|k| k == p)), "{update:?}");
    let update_rec = records.iter().find(|r| r["op"] == "update_one").unwrap();
    assert_eq!(update_rec["n"], 1);
}

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::logger::{AUDIT_TARGET, METRICS_TARGET};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
    pub query_log_path: Option<PathBuf>,
    pub structured_json: bool,
    pub enable_audit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { slow_query_ms: 500, query_log_path: None, structured_json: true, enable_audit: false }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub audits_total: AtomicU64,
    pub timeouts_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> = std::sync::LazyLock::new(Telemetry::default);

pub fn set_query_log(path: PathBuf, structured_json: Option<bool>) {
    let mut w = TELEMETRY.cfg.write();
    w.query_log_path = Some(path);
    if let Some(js) = structured_json {
        w.structured_json = js;
    }
}
pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}
pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}
pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn write_line(path: &Path, line: &str) {
    if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        use std::io::Write;
        let _ = writeln!(f, "{line}");
    }
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

/// Record one finished query. Slow queries are also logged at warn level.
pub fn log_query(namespace: &str, filter_dbg: &str, duration_ms: u128, returned: usize, skip: u64, limit: i64) {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
    let cfg = TELEMETRY.cfg.read().clone();
    let filter_hash = sha256_hex(filter_dbg);
    let slow = u64::try_from(duration_ms).map_or(true, |ms| ms >= cfg.slow_query_ms);
    if slow {
        TELEMETRY.metrics.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!("slow query on {namespace}: {duration_ms}ms filter={filter_dbg}");
    }
    let Some(path) = cfg.query_log_path.as_ref() else {
        return;
    };
    let line = if cfg.structured_json {
        serde_json::json!({
            "ts": now_ts(),
            "ns": namespace,
            "filter_hash": filter_hash,
            "duration_ms": u64::try_from(duration_ms).unwrap_or(u64::MAX),
            "returned": returned,
            "skip": skip,
            "limit": limit,
            "slow": slow
        })
        .to_string()
    } else {
        format!(
            "ts={} ns={namespace} filter_hash={filter_hash} duration_ms={duration_ms} returned={returned} skip={skip} limit={limit} slow={slow}",
            now_ts()
        )
    };
    write_line(path, &line);
}

pub fn log_timeout(namespace: &str) {
    TELEMETRY.metrics.timeouts_total.fetch_add(1, Ordering::Relaxed);
    log::warn!("query on {namespace} exceeded its time limit");
}

/// Count a write and, when auditing is on, emit an audit line.
pub fn log_audit(op: &str, namespace: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    TELEMETRY.metrics.audits_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "ns": namespace, "doc_id": doc_id
    })
    .to_string();
    log::info!(target: AUDIT_TARGET, "{line}");
    let audit_clone = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = audit_clone {
        sink.write().push(line.clone());
    }
    let log_path = TELEMETRY.cfg.read().query_log_path.clone();
    if let Some(path) = log_path.as_ref() {
        write_line(path, &line);
    }
}

#[must_use]
pub fn metrics_text() -> String {
    // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
    let m = &TELEMETRY.metrics;
    format!(
        "montylite_queries_total {}\n\
         montylite_queries_slow_total {}\n\
         montylite_writes_total {}\n\
         montylite_audits_total {}\n\
         montylite_timeouts_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.queries_slow_total.load(Ordering::Relaxed),
        m.writes_total.load(Ordering::Relaxed),
        m.audits_total.load(Ordering::Relaxed),
        m.timeouts_total.load(Ordering::Relaxed),
    )
}

/// Write the current counters to the metrics log target.
pub fn emit_metrics() {
    for line in metrics_text().lines() {
        log::info!(target: METRICS_TARGET, "{line}");
    }
}

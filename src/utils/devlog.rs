//! Per-operation phase timings.
//!
//! Every engine operation (find, count, distinct, update, delete) carries an [`OpTimer`] that
//! splits its wall time into named phases such as `compile`, `scan`, `sort`, `project` and
//! `apply`. On finish the timer emits one JSON record on the `montylite::dev6` target at trace
//! level. Tests capture the records per thread instead of installing a global logger.

use std::cell::RefCell;
use std::time::Instant;

use serde_json::{Map, Value, json};

use crate::utils::num::{u128_to_u64_saturating, usize_to_u64};

/// Log target the timing records are written to.
pub const DEV_TARGET: &str = "montylite::dev6";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<Value>>> = const { RefCell::new(None) };
}

/// Stops capturing on the current thread when dropped.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing timing records emitted on this thread.
#[must_use]
pub fn capture() -> CaptureGuard {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard
}

/// Records captured so far on this thread, clearing the buffer.
pub fn take_captured() -> Vec<Value> {
    CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

fn capturing() -> bool {
    CAPTURED.with(|c| c.borrow().is_some())
}

/// Wall-clock split of one operation.
#[derive(Debug)]
pub struct OpTimer {
    op: &'static str,
    ns: String,
    started: Instant,
    mark: Instant,
    phases: Vec<(&'static str, u128)>,
}

impl OpTimer {
    #[must_use]
    pub fn start(op: &'static str, ns: impl ToString) -> Self {
        let now = Instant::now();
        Self { op, ns: ns.to_string(), started: now, mark: now, phases: Vec::new() }
    }

    /// Close the current phase under `name`. Repeated names accumulate.
    pub fn phase(&mut self, name: &'static str) {
        let now = Instant::now();
        let us = now.duration_since(self.mark).as_micros();
        self.mark = now;
        match self.phases.iter_mut().find(|(n, _)| *n == name) {
            Some((_, total)) => *total += us,
            None => self.phases.push((name, us)),
        }
    }

    /// Emit the record; `n` is the operation's result size (documents returned, modified, ...).
    pub fn finish(self, n: usize) {
        let capture = capturing();
        if !capture && !log::log_enabled!(target: DEV_TARGET, log::Level::Trace) {
            return;
        }
        let phases: Map<String, Value> = self
            .phases
            .iter()
            .map(|(name, us)| ((*name).to_string(), json!(u128_to_u64_saturating(*us))))
            .collect();
        let record = json!({
            "op": self.op,
            "ns": self.ns,
            "n": usize_to_u64(n),
            "us": u128_to_u64_saturating(self.started.elapsed().as_micros()),
            "phases": phases,
        });
        log::trace!(target: DEV_TARGET, "{record}");
        if capture {
            CAPTURED.with(|c| {
                if let Some(buf) = c.borrow_mut().as_mut() {
                    buf.push(record);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_phases_in_order() {
        let _g = capture();
        let mut t = OpTimer::start("find", "db.items");
        t.phase("scan");
        t.phase("sort");
        t.phase("scan");
        t.finish(3);
        let recs = take_captured();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0]["op"], "find");
        assert_eq!(recs[0]["ns"], "db.items");
        assert_eq!(recs[0]["n"], 3);
        let phases = recs[0]["phases"].as_object().unwrap();
        assert_eq!(phases.keys().collect::<Vec<_>>(), ["scan", "sort"]);
        assert!(take_captured().is_empty());
    }

    #[test]
    fn capture_is_per_thread() {
        let _g = capture();
        let child = std::thread::spawn(|| {
            OpTimer::start("count", "db.x").finish(0);
            take_captured()
        });
        assert!(child.join().unwrap().is_empty());
        OpTimer::start("count", "db.x").finish(0);
        assert_eq!(take_captured().len(), 1);
    }

    #[test]
    fn nothing_is_kept_without_capture() {
        OpTimer::start("count", "db.x").finish(0);
        assert!(take_captured().is_empty());
    }
}

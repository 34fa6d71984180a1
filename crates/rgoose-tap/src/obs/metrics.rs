//! Minimal metrics registry for the tap.
//!
//! Counter/histogram types with dynamic labels backed by `DashMap`. Labels are
//! flattened into sorted key vectors to keep deterministic ordering. Histogram
//! buckets are fixed in microseconds to avoid floating point math.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &[(String, String)]) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Sum across all label sets.
    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let labels = label_str(r.key());
            if labels.is_empty() {
                let _ = writeln!(out, "{} {}", name, val);
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
            }
        }
    }
}

// Fixed buckets in microseconds: 5us .. 10ms
const BUCKETS_MICROS: [u64; 7] = [5, 10, 50, 100, 500, 1_000, 10_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 7],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<Vec<(String, String)>, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (microsecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = duration.as_micros() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Render in Prometheus text exposition format (unit: microseconds).
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct TapMetrics {
    /// Frames walked, by framing and outcome (ok / warn / error).
    pub frames: CounterVec,
    /// Datagrams dropped before decoding, by reason.
    pub rejected: CounterVec,
    /// Markers emitted, by code.
    pub markers: CounterVec,
    /// GOOSE APDU entries decoded from R-GOOSE payloads.
    pub apdus: CounterVec,
    pub decode_duration: HistogramVec,
    draining: AtomicBool,
}

impl TapMetrics {
    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all registered metrics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.frames.render("rgoose_frames_total", &mut out);
        self.rejected.render("rgoose_rejected_total", &mut out);
        self.markers.render("rgoose_markers_total", &mut out);
        self.apdus.render("rgoose_apdus_total", &mut out);
        self.decode_duration.render("rgoose_decode_duration_micros", &mut out);

        let _ = writeln!(
            out,
            "# TYPE rgoose_draining gauge\nrgoose_draining {}",
            if self.is_draining() { 1 } else { 0 }
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_label_order_independent() {
        let c = CounterVec::default();
        c.inc(&[("framing", "cltp"), ("outcome", "ok")]);
        c.add(&[("outcome", "ok"), ("framing", "cltp")], 2);
        assert_eq!(c.get(&[("framing", "cltp"), ("outcome", "ok")]), 3);
        assert_eq!(c.get(&[("framing", "goose"), ("outcome", "ok")]), 0);
        assert_eq!(c.total(), 3);
    }

    #[test]
    fn render_includes_histogram_and_draining() {
        let m = TapMetrics::default();
        m.markers.inc(&[("code", "goose.zero_pdu")]);
        m.decode_duration.observe(&[("framing", "rgoose")], Duration::from_micros(7));
        m.set_draining();

        let text = m.render();
        assert!(text.contains("rgoose_markers_total{code=\"goose.zero_pdu\"} 1"));
        assert!(text.contains("rgoose_decode_duration_micros_bucket{framing=\"rgoose\",le=\"5\"} 0"));
        assert!(text.contains("rgoose_decode_duration_micros_bucket{framing=\"rgoose\",le=\"10\"} 1"));
        assert!(text.contains("rgoose_draining 1"));
    }
}

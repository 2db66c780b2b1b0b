//! Metrics descriptions, recording helpers and an in-memory recorder for
//! the CLI `--metrics` summary.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;
use qscript_ir::BytecodeIr;

use crate::RunReport;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "qscript_vm_instructions_total",
        Unit::Count,
        "Instructions executed by the VM"
    );
    describe_counter!(
        "qscript_vm_halts_total",
        Unit::Count,
        "VM halts, labelled by reason"
    );
    describe_counter!(
        "qscript_cfg_blocks_total",
        Unit::Count,
        "Basic blocks created by control flow graph construction"
    );
    describe_counter!(
        "qscript_solver_budget_exhausted_total",
        Unit::Count,
        "Value queries that ran out of iterations"
    );
    describe_counter!(
        "qscript_designations_total",
        Unit::Count,
        "Floor designations found"
    );
    describe_counter!(
        "qscript_vm_frames_total",
        Unit::Count,
        "Frames driven by the run loop"
    );

    describe_gauge!(
        "qscript_program_segments",
        Unit::Count,
        "Segments in the loaded program"
    );
    describe_gauge!(
        "qscript_program_instructions",
        Unit::Count,
        "Instructions in the loaded program"
    );

    describe_histogram!(
        "qscript_load_duration_seconds",
        Unit::Seconds,
        "Time to read and parse a listing"
    );
    describe_histogram!(
        "qscript_run_duration_seconds",
        Unit::Seconds,
        "Wall-clock time of a run"
    );
}

/// Record the size of a freshly loaded program.
#[allow(clippy::cast_precision_loss)]
pub fn record_load(ir: &BytecodeIr, duration_secs: f64) {
    gauge!("qscript_program_segments").set(ir.segments().len() as f64);
    gauge!("qscript_program_instructions").set(ir.instruction_count() as f64);
    histogram!("qscript_load_duration_seconds").record(duration_secs);
}

/// Record a finished run.
pub fn record_run(report: &RunReport, duration_secs: f64) {
    let labels = [("result", report.result.to_string())];
    counter!("qscript_vm_frames_total", &labels).increment(report.frames as u64);
    histogram!("qscript_run_duration_seconds", &labels).record(duration_secs);
}

/// Values of one metric kind, keyed by rendered metric key.
struct Storage<T> {
    values: RwLock<HashMap<String, T>>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Storage<T> {
    fn update(&self, key: &str, f: impl FnOnce(&mut T), init: T) {
        let mut values = self.values.write();
        f(values.entry(key.to_string()).or_insert(init));
    }

    fn get(&self, key: &str) -> Option<T> {
        self.values.read().get(key).cloned()
    }

    fn snapshot(&self) -> HashMap<String, T> {
        self.values.read().clone()
    }

    /// Entries sorted by key.
    fn sorted(&self) -> Vec<(String, T)> {
        let mut entries: Vec<_> = self.snapshot().into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

struct Handle<T> {
    key: String,
    storage: Arc<Storage<T>>,
}

impl metrics::CounterFn for Handle<u64> {
    fn increment(&self, value: u64) {
        self.storage.update(&self.key, |v| *v += value, 0);
    }

    fn absolute(&self, value: u64) {
        self.storage.update(&self.key, |v| *v = value, 0);
    }
}

impl metrics::GaugeFn for Handle<f64> {
    fn increment(&self, value: f64) {
        self.storage.update(&self.key, |v| *v += value, 0.0);
    }

    fn decrement(&self, value: f64) {
        self.storage.update(&self.key, |v| *v -= value, 0.0);
    }

    fn set(&self, value: f64) {
        self.storage.update(&self.key, |v| *v = value, 0.0);
    }
}

impl metrics::HistogramFn for Handle<Vec<f64>> {
    fn record(&self, value: f64) {
        self.storage.update(&self.key, |v| v.push(value), Vec::new());
    }
}

/// Recorder that keeps metrics in memory so the CLI can print them.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<Storage<u64>>,
    gauges: Arc<Storage<f64>>,
    histograms: Arc<Storage<Vec<f64>>>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. Returns `None` if a recorder is
    /// already installed.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }

    fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            counters: Arc::clone(&self.counters),
            gauges: Arc::clone(&self.gauges),
            histograms: Arc::clone(&self.histograms),
        }
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(Handle {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(Handle {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(Handle {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Read access to what an installed [`CliRecorder`] collected.
pub struct CliRecorderHandle {
    counters: Arc<Storage<u64>>,
    gauges: Arc<Storage<f64>>,
    histograms: Arc<Storage<Vec<f64>>>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.get(key)
    }

    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.get(key)
    }

    pub fn get_histogram(&self, key: &str) -> Option<Vec<f64>> {
        self.histograms.get(key)
    }

    pub fn all_counters(&self) -> HashMap<String, u64> {
        self.counters.snapshot()
    }

    pub fn all_gauges(&self) -> HashMap<String, f64> {
        self.gauges.snapshot()
    }

    pub fn all_histograms(&self) -> HashMap<String, Vec<f64>> {
        self.histograms.snapshot()
    }

    /// Render the collected metrics as a markdown-ish summary.
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let counters = self.counters.sorted();
        let gauges = self.gauges.sorted();
        let histograms = self.histograms.sorted();
        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            return "No metrics collected.\n".to_string();
        }

        let mut out = String::from("\n## Metrics Summary\n\n");
        if !counters.is_empty() {
            out.push_str("### Counters\n");
            for (key, value) in &counters {
                let _ = writeln!(out, "  {key}: {value}");
            }
            out.push('\n');
        }
        if !gauges.is_empty() {
            out.push_str("### Gauges\n");
            for (key, value) in &gauges {
                let _ = writeln!(out, "  {key}: {value:.6}");
            }
            out.push('\n');
        }
        let histograms: Vec<_> = histograms.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !histograms.is_empty() {
            out.push_str("### Histograms\n");
            for (key, values) in histograms {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                let _ = writeln!(
                    out,
                    "  {key}: count={}, min={min:.6}, max={max:.6}, avg={avg:.6}",
                    values.len()
                );
            }
            out.push('\n');
        }
        out
    }

    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{CounterFn, GaugeFn, HistogramFn, Label};

    #[test]
    fn test_key_to_string() {
        let key = Key::from_name("qscript_vm_halts_total");
        assert_eq!(key_to_string(&key), "qscript_vm_halts_total");

        let key = Key::from_parts("qscript_vm_halts_total", vec![Label::new("reason", "exit")]);
        assert_eq!(key_to_string(&key), "qscript_vm_halts_total{reason=exit}");

        let key = Key::from_parts(
            "m",
            vec![Label::new("reason", "fault"), Label::new("result", "halted")],
        );
        assert_eq!(key_to_string(&key), "m{reason=fault,result=halted}");
    }

    #[test]
    fn test_handles_update_storage() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();

        let counter = Handle {
            key: "c".to_string(),
            storage: Arc::clone(&recorder.counters),
        };
        counter.increment(5);
        counter.increment(2);
        assert_eq!(handle.get_counter("c"), Some(7));
        counter.absolute(10);
        assert_eq!(handle.get_counter("c"), Some(10));

        let gauge = Handle {
            key: "g".to_string(),
            storage: Arc::clone(&recorder.gauges),
        };
        gauge.set(1.5);
        gauge.decrement(0.5);
        assert_eq!(handle.get_gauge("g"), Some(1.0));

        let histogram = Handle {
            key: "h".to_string(),
            storage: Arc::clone(&recorder.histograms),
        };
        histogram.record(1.0);
        histogram.record(3.0);
        assert_eq!(handle.get_histogram("h"), Some(vec![1.0, 3.0]));
        assert_eq!(handle.all_counters().len(), 1);
    }

    #[test]
    fn test_summary() {
        let recorder = CliRecorder::new();
        let handle = recorder.handle();
        assert_eq!(handle.summary(), "No metrics collected.\n");

        Handle {
            key: "qscript_vm_frames_total".to_string(),
            storage: Arc::clone(&recorder.counters),
        }
        .increment(3);
        Handle {
            key: "qscript_run_duration_seconds".to_string(),
            storage: Arc::clone(&recorder.histograms),
        }
        .record(0.5);

        let summary = handle.summary();
        assert!(summary.contains("## Metrics Summary"));
        assert!(summary.contains("  qscript_vm_frames_total: 3\n"));
        assert!(summary.contains("count=1, min=0.500000, max=0.500000, avg=0.500000"));
        assert!(!summary.contains("### Gauges"));
    }
}

//! Minimal run‑time metrics sink.
//!
//! Prometheus export is left out; instead the host process may register a
//! raw callback that receives name/value pairs. Nothing is installed until a
//! callback is registered, so Rust callers stay free to set their own
//! recorder.

use dashmap::DashMap;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Recorder, SharedString, Unit};
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_ulonglong};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Signature for external collectors.
pub type StatsCallback = unsafe extern "C" fn(name: *const c_char, value: c_ulonglong);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register a callback from C/other languages. Only the first registration wins.
///
/// # Safety
/// `cb` must stay callable for the rest of the process and must not unwind.
#[no_mangle]
pub unsafe extern "C" fn cidrtrie_register_stats_callback(cb: StatsCallback) {
    let _ = CALLBACK.set(cb);
    init();
}

/// Forwarding recorder. Uses the callback **if** it was registered.
///
/// Gauges are cached per name so that `increment`/`decrement` can forward the
/// resulting level rather than the step.
#[derive(Default)]
struct FfiRecorder {
    gauges: DashMap<String, Arc<FfiMetric>>,
}

/// Metric name kept NUL-terminated for the callback, plus the current gauge
/// level stored as `f64` bits.
struct FfiMetric {
    name: CString,
    level: AtomicU64,
}

impl FfiMetric {
    fn new(key: &Key) -> Self {
        let name = CString::new(key.name()).unwrap_or_default();
        Self {
            name,
            level: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Apply `f` to the gauge level and return the new level.
    fn adjust(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.level.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self
                .level
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return f64::from_bits(next),
                Err(seen) => current = seen,
            }
        }
    }

    fn emit(&self, value: u64) {
        if let Some(cb) = CALLBACK.get() {
            unsafe { cb(self.name.as_ptr(), value as c_ulonglong) };
        }
    }
}

impl Recorder for FfiRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }

    fn register_counter(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(FfiMetric::new(key)))
    }
    fn register_gauge(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Gauge {
        let gauge = self
            .gauges
            .entry(key.name().to_owned())
            .or_insert_with(|| Arc::new(FfiMetric::new(key)))
            .clone();
        Gauge::from_arc(gauge)
    }
    fn register_histogram(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(FfiMetric::new(key)))
    }
}

impl metrics::CounterFn for FfiMetric {
    fn increment(&self, value: u64) {
        self.emit(value);
    }
    fn absolute(&self, value: u64) {
        self.emit(value);
    }
}

impl metrics::GaugeFn for FfiMetric {
    // The callback always receives the gauge level, clamped at zero.
    fn set(&self, value: f64) {
        self.level.store(value.to_bits(), Ordering::Release);
        self.emit(value as u64);
    }
    fn increment(&self, value: f64) {
        let level = self.adjust(|v| v + value);
        self.emit(level as u64);
    }
    fn decrement(&self, value: f64) {
        let level = self.adjust(|v| v - value);
        self.emit(level as u64);
    }
}

impl metrics::HistogramFn for FfiMetric {
    fn record(&self, value: f64) {
        self.emit(value as u64);
    }
}

/// Install the forwarding recorder exactly **once**.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = metrics::set_global_recorder(FfiRecorder::default());
    });
}

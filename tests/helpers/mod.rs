//! Test helpers and fixtures for fxhost integration tests
//!
//! Every fixture runs against `MockUnit`, so no native units are needed.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, sums)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

pub mod tolerances;

use fxhost::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Block size used by processing tests, below the default maximum.
pub const TEST_BLOCK_SIZE: usize = 256;

pub const DELAY_PATH: &str = "appl/aufx/dely/My Delay";

/// Handles of every unit the fixture registry created, in creation order.
pub type Handles = Arc<Mutex<Vec<MockHandle>>>;

/// Log to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Registry with the delay effect at [`DELAY_PATH`]; `make` builds each unit.
pub fn registry_with(make: fn() -> MockUnit) -> (ComponentRegistry, Handles) {
    let handles: Handles = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&handles);
    let registry = ComponentRegistry::new();
    registry.register(
        EffectDescriptor::parse(DELAY_PATH).expect("valid descriptor"),
        0x0001_0000,
        move || {
            let unit = make();
            record.lock().push(unit.handle());
            Ok(Box::new(unit) as Box<dyn NativeUnit>)
        },
    );
    (registry, handles)
}

/// Host over a fresh in-memory store.
pub fn test_host() -> (FxHost, Handles) {
    test_host_with(MemoryConfig::new())
}

pub fn test_host_with(store: MemoryConfig) -> (FxHost, Handles) {
    init_tracing();
    let (registry, handles) = registry_with(MockUnit::effect);
    let host = FxHost::builder()
        .registry(registry)
        .config_store(store)
        .sample_rate(TEST_SAMPLE_RATE)
        .build()
        .expect("Failed to create test host");
    (host, handles)
}

pub fn handle(handles: &Handles, index: usize) -> MockHandle {
    handles.lock()[index].clone()
}

/// Constant signal of `value`.
pub fn constant(value: f32, num_samples: usize) -> Vec<f32> {
    vec![value; num_samples]
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

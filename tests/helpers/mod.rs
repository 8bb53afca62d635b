//! Test helpers and fixtures for pdbridge integration tests
//!
//! Instances run against the scripted mock engine and Vec-backed host
//! buffers from `pdbridge::core::mock`, so no libpd or plugin host is needed.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use std::path::Path;
use std::sync::Arc;

use pdbridge::core::mock::{MockEngine, MockHost, MOCK_URIDS};
use pdbridge::prelude::*;
use pdbridge::EngineContext;

/// Engine block size used by most tests (libpd's default).
pub const TEST_BLOCK_SIZE: usize = 64;

/// Host callback size; a multiple of [`TEST_BLOCK_SIZE`].
pub const TEST_BUFFER_SIZE: usize = 256;

/// Bundle directory handed to the mock engine.
pub const TEST_BUNDLE: &str = "/bundles/test.lv2";

/// Port indices of [`stereo_table`].
pub mod port {
    pub const IN_L: usize = 0;
    pub const IN_R: usize = 1;
    pub const OUT_L: usize = 2;
    pub const OUT_R: usize = 3;
    pub const WIDTH_IN: usize = 4;
    pub const WIDTH_OUT: usize = 5;
    pub const MIDI_IN: usize = 6;
    pub const MIDI_OUT: usize = 7;
}

/// Stereo effect with one control echoed back, one MIDI port each way.
pub fn stereo_table() -> Arc<PortTable> {
    Arc::new(PortTable::new(&[
        PortSpec::audio_in("in_l"),
        PortSpec::audio_in("in_r"),
        PortSpec::audio_out("out_l"),
        PortSpec::audio_out("out_r"),
        PortSpec::control_in("width").with_range(0.0, 1.0, 2.0),
        PortSpec::control_out("width"),
        PortSpec::midi_in("midi_in"),
        PortSpec::midi_out("midi_out"),
    ]))
}

/// Mono passthrough, the smallest useful table.
pub fn mono_table() -> Arc<PortTable> {
    Arc::new(PortTable::new(&[
        PortSpec::audio_in("in"),
        PortSpec::audio_out("out"),
    ]))
}

pub fn test_context(engine: MockEngine) -> Arc<EngineContext<MockEngine>> {
    Arc::new(EngineContext::new(engine))
}

/// Route bridge logs to the test harness (shown with `--nocapture`).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Open an instance with the default configuration.
pub fn open_instance(
    context: &Arc<EngineContext<MockEngine>>,
    table: &Arc<PortTable>,
) -> Instance<MockEngine> {
    open_instance_with(context, table, &BridgeConfig::default())
}

pub fn open_instance_with(
    context: &Arc<EngineContext<MockEngine>>,
    table: &Arc<PortTable>,
    config: &BridgeConfig,
) -> Instance<MockEngine> {
    Instance::open(
        context.clone(),
        table.clone(),
        Path::new(TEST_BUNDLE),
        MOCK_URIDS,
        config,
    )
    .expect("Failed to open test instance")
}

/// An activated instance plus a host with every port connected.
pub fn running_instance(
    context: &Arc<EngineContext<MockEngine>>,
    table: &Arc<PortTable>,
    frames: usize,
) -> (Instance<MockEngine>, MockHost) {
    let mut instance = open_instance(context, table);
    instance.activate();
    (instance, MockHost::new(table, frames))
}

/// 0.0, 1.0, 2.0, ... offset by `start`, so every sample is distinct.
pub fn ramp(start: usize, num_samples: usize) -> Vec<f32> {
    (start..start + num_samples).map(|i| i as f32).collect()
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Assert all samples are below the silence threshold.
pub fn assert_silent(samples: &[f32], context: &str) {
    for (i, &s) in samples.iter().enumerate() {
        assert!(
            s.abs() < tolerances::SILENCE_THRESHOLD,
            "{context}: sample {i} is {s}, expected silence"
        );
    }
}

/// Assert two buffers match sample by sample.
pub fn assert_buffers_equal(actual: &[f32], expected: &[f32], context: &str) {
    assert_eq!(actual.len(), expected.len(), "{context}: length mismatch");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() < tolerances::FLOAT_EPSILON,
            "{context}: sample {i} is {a}, expected {e}"
        );
    }
}

/// Snapshot of the calls the engine has seen so far.
pub fn engine_calls(
    context: &EngineContext<MockEngine>,
) -> Vec<pdbridge::core::mock::EngineCall> {
    context.with_engine(|engine| engine.calls().to_vec())
}

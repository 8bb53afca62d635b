//! Instance lifecycle integration tests
//!
//! Open, activation, processing before activation and teardown against one
//! shared engine.

use std::path::Path;

use pdbridge::core::mock::{EngineCall, MockEngine, MockHost, MOCK_URIDS};
use pdbridge::prelude::*;
use pdbridge::{BridgeError, LoadStage};

use crate::helpers::*;

#[test]
fn test_open_binds_control_outputs() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let instance = open_instance(&context, &stereo_table());

    assert_eq!(instance.instantiation_id(), 1001);
    assert_eq!(instance.block_size(), TEST_BLOCK_SIZE);
    assert!(!instance.is_activated());
    let bound = context.with_engine(|engine| engine.bound().to_vec());
    assert_eq!(bound, vec!["1001-lv2-width".to_string()]);
}

#[test]
fn test_missing_patch_fails_at_patch_stage() {
    init_test_logging();
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE).missing_patch("host.pd"));
    let err = Instance::open(
        context.clone(),
        stereo_table(),
        Path::new(TEST_BUNDLE),
        MOCK_URIDS,
        &BridgeConfig::default(),
    )
    .err()
    .expect("open should fail");

    assert_eq!(err.stage(), Some(LoadStage::Patch));
    assert!(context.with_engine(|engine| engine.open_patches().is_empty()));

    let err: pdbridge::Error = err.into();
    assert!(err.to_string().contains("host.pd"));
}

#[test]
fn test_invalid_table_is_refused() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = std::sync::Arc::new(PortTable::new(&[
        PortSpec::control_in("gain").with_range(1.0, 5.0, 2.0),
    ]));
    let err = Instance::open(context, table, Path::new(TEST_BUNDLE), MOCK_URIDS, &BridgeConfig::default())
        .err()
        .expect("open should fail");
    assert!(matches!(err, BridgeError::InvalidPortTable(_)));
}

#[test]
fn test_activation_enables_dsp() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let mut instance = open_instance(&context, &mono_table());
    instance.activate();

    assert!(instance.is_activated());
    let calls = engine_calls(&context);
    assert!(calls.contains(&EngineCall::Message {
        receiver: "pd".to_string(),
        selector: "dsp".to_string(),
        args: vec![1.0],
    }));
}

#[test]
fn test_output_is_silent_before_activation() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let mut instance = open_instance(&context, &table);
    let mut host = MockHost::new(&table, TEST_BUFFER_SIZE);
    host.audio_mut(0).copy_from_slice(&ramp(1, TEST_BUFFER_SIZE));
    host.audio_mut(1).fill(0.5);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    assert_silent(host.audio(1), "before activation");
    assert_eq!(context.with_engine(|engine| engine.processed()), 0);
}

#[test]
fn test_deactivated_instance_goes_silent_again() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    host.audio_mut(0).copy_from_slice(&ramp(1, TEST_BUFFER_SIZE));

    instance.process(&mut host, TEST_BUFFER_SIZE);
    assert_buffers_equal(host.audio(1), &ramp(1, TEST_BUFFER_SIZE), "active");

    instance.deactivate();
    instance.process(&mut host, TEST_BUFFER_SIZE);
    assert_silent(host.audio(1), "after deactivation");
}

#[test]
fn test_teardown_unbinds_and_closes_once() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE).with_ids([3, 7]));
    let table = stereo_table();
    let first = open_instance(&context, &table);
    let second = open_instance(&context, &table);
    context.with_engine(|engine| engine.take_calls());

    drop(first);

    let calls = engine_calls(&context);
    let unbinds = calls.iter().filter(|c| matches!(c, EngineCall::Unbind(_))).count();
    let closes: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, EngineCall::ClosePatch(_)))
        .collect();
    assert_eq!(unbinds, 1);
    assert_eq!(closes, vec![&EngineCall::ClosePatch(3)]);
    assert!(calls.contains(&EngineCall::Unbind("3-lv2-width".to_string())));

    // The other instance is untouched.
    let (open, bound) = context.with_engine(|engine| (engine.open_patches().to_vec(), engine.bound().to_vec()));
    assert_eq!(open, vec![7]);
    assert_eq!(bound, vec!["7-lv2-width".to_string()]);

    drop(second);
    assert!(context.with_engine(|engine| engine.open_patches().is_empty()));
}

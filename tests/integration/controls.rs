//! Control routing integration tests
//!
//! Control inputs reach the engine under per-instance names; engine floats
//! come back only to the instance whose name they carry.

use pdbridge::core::mock::{EngineCall, Emission, MockEngine};
use pdbridge::NamespaceRouter;

use crate::helpers::*;

#[test]
fn test_same_port_name_routes_apart() {
    let three = NamespaceRouter::new(3);
    let seven = NamespaceRouter::new(7);
    assert_eq!(three.route("width"), "3-lv2-width");
    assert_eq!(seven.route("width"), "7-lv2-width");
    assert!(three.owns("3-lv2-width"));
    assert!(!seven.owns("3-lv2-width"));
}

#[test]
fn test_control_round_trip_stays_within_instance() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE).with_ids([3, 7]).echo_bound_floats());
    let table = stereo_table();
    let (mut three, mut host_three) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    let (mut seven, mut host_seven) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    assert_eq!(three.instantiation_id(), 3);
    assert_eq!(seven.instantiation_id(), 7);

    host_three.set_control(port::WIDTH_IN, 0.5);
    host_seven.set_control(port::WIDTH_IN, 1.25);
    host_seven.set_control(port::WIDTH_OUT, 0.0);

    three.process(&mut host_three, TEST_BUFFER_SIZE);
    assert_eq!(host_three.control(port::WIDTH_OUT), Some(0.5));

    let calls = engine_calls(&context);
    assert!(calls.contains(&EngineCall::Float {
        receiver: "3-lv2-width".to_string(),
        value: 0.5,
    }));

    // Seven has not run; it never sees three's value.
    assert_eq!(host_seven.control(port::WIDTH_OUT), Some(0.0));

    seven.process(&mut host_seven, TEST_BUFFER_SIZE);
    assert_eq!(host_seven.control(port::WIDTH_OUT), Some(1.25));
    assert_eq!(host_three.control(port::WIDTH_OUT), Some(0.5));
}

#[test]
fn test_float_for_other_instance_is_ignored() {
    let mut engine = MockEngine::new(TEST_BLOCK_SIZE).with_ids([3, 7]);
    engine.emit_at(0, Emission::Float("7-lv2-width".to_string(), 0.9));
    engine.emit_at(1, Emission::Float("3-lv2-width".to_string(), 0.4));
    let context = test_context(engine);
    let table = stereo_table();
    let (mut three, mut host_three) = running_instance(&context, &table, TEST_BLOCK_SIZE);
    let (_seven, mut host_seven) = running_instance(&context, &table, TEST_BLOCK_SIZE);
    host_three.set_control(port::WIDTH_OUT, 0.0);
    host_seven.set_control(port::WIDTH_OUT, 0.0);

    // Block 0 reports seven's name while three holds the engine.
    three.process(&mut host_three, TEST_BLOCK_SIZE);
    assert_eq!(host_three.control(port::WIDTH_OUT), Some(0.0));

    three.process(&mut host_three, TEST_BLOCK_SIZE);
    assert_eq!(host_three.control(port::WIDTH_OUT), Some(0.4));
    assert_eq!(host_seven.control(port::WIDTH_OUT), Some(0.0));
}

#[test]
fn test_unconnected_control_input_sends_default() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE).echo_bound_floats());
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    host.disconnect(port::WIDTH_IN);
    host.set_control(port::WIDTH_OUT, 0.0);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    // The declared default travels the whole round trip.
    assert_eq!(host.control(port::WIDTH_OUT), Some(1.0));

    let calls = engine_calls(&context);
    assert!(calls.contains(&EngineCall::Float {
        receiver: "1001-lv2-width".to_string(),
        value: 1.0,
    }));
}

#[test]
fn test_controls_reach_engine_before_first_block() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    context.with_engine(|engine| engine.take_calls());
    host.set_control(port::WIDTH_IN, 0.75);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    let calls = engine_calls(&context);
    let float_at = calls
        .iter()
        .position(|c| matches!(c, EngineCall::Float { .. }))
        .expect("control input was sent");
    let first_block = calls
        .iter()
        .position(|c| *c == EngineCall::Process)
        .expect("engine ran");
    assert!(float_at < first_block);
    assert_eq!(
        calls.iter().filter(|c| **c == EngineCall::Process).count(),
        TEST_BUFFER_SIZE / TEST_BLOCK_SIZE
    );
}

//! MIDI integration tests
//!
//! Host sequences in, engine calls out, and engine MIDI back into host
//! sequences with the right timestamps.

use std::sync::Arc;

use pdbridge::core::mock::{EngineCall, Emission, MockEngine, MockHost};
use pdbridge::prelude::*;

use crate::helpers::*;

fn position(calls: &[EngineCall], wanted: &EngineCall) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not found in {calls:?}"))
}

/// Index of the `n`th (zero-based) engine block in `calls`.
fn block_position(calls: &[EngineCall], n: usize) -> usize {
    calls
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == EngineCall::Process)
        .nth(n)
        .map(|(i, _)| i)
        .expect("engine block missing")
}

#[test]
fn test_note_on_reaches_engine() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    host.set_midi_input(port::MIDI_IN, &[(0, &[0x91, 0x40, 0x60])]);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    let calls = engine_calls(&context);
    assert!(calls.contains(&EngineCall::NoteOn {
        channel: 1,
        pitch: 64,
        velocity: 96,
    }));
    for byte in [0x91, 0x40, 0x60] {
        assert!(calls.contains(&EngineCall::MidiByte { port: 0, byte }));
    }
}

#[test]
fn test_pitch_bend_center_is_zero() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    host.set_midi_input(port::MIDI_IN, &[(10, &[0xE0, 0x00, 0x40])]);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    assert!(engine_calls(&context).contains(&EngineCall::PitchBend { channel: 0, value: 0 }));
}

#[test]
fn test_events_arrive_before_their_block() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    context.with_engine(|engine| engine.take_calls());
    host.set_midi_input(
        port::MIDI_IN,
        &[(0, &[0x90, 60, 100]), (100, &[0xB0, 7, 90]), (200, &[0xC0, 5])],
    );

    instance.process(&mut host, TEST_BUFFER_SIZE);

    let calls = engine_calls(&context);
    let note = position(&calls, &EngineCall::NoteOn { channel: 0, pitch: 60, velocity: 100 });
    let cc = position(&calls, &EngineCall::ControlChange { channel: 0, control: 7, value: 90 });
    let program = position(&calls, &EngineCall::ProgramChange { channel: 0, program: 5 });

    // Frame 0 is in block 0, 100 in block 1, 200 in block 3.
    assert!(note < block_position(&calls, 0));
    assert!(block_position(&calls, 0) < cc && cc < block_position(&calls, 1));
    assert!(block_position(&calls, 2) < program && program < block_position(&calls, 3));
}

#[test]
fn test_events_past_last_block_are_not_lost() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let frames = 2 * TEST_BLOCK_SIZE + 10;
    let (mut instance, mut host) = running_instance(&context, &table, frames);
    host.set_midi_input(port::MIDI_IN, &[(frames as i64 - 1, &[0x80, 60, 0])]);

    instance.process(&mut host, frames);

    // Note-off is delivered as a zero-velocity note-on.
    assert!(engine_calls(&context).contains(&EngineCall::NoteOn {
        channel: 0,
        pitch: 60,
        velocity: 0,
    }));
}

#[test]
fn test_engine_note_is_stamped_with_its_block() {
    let mut engine = MockEngine::new(TEST_BLOCK_SIZE);
    engine.emit_at(
        2,
        Emission::Midi(MidiMessage::NoteOn {
            channel: 2,
            note: 60,
            velocity: 100,
        }),
    );
    let context = test_context(engine);
    let table = Arc::new(PortTable::new(&[
        PortSpec::audio_out("out"),
        PortSpec::midi_out("notes"),
        PortSpec::midi_out("thru"),
    ]));
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    let expected = vec![(128, vec![0x92, 0x3C, 0x64])];
    assert_eq!(host.midi_output(1), expected);
    assert_eq!(host.midi_output(2), expected);
}

#[test]
fn test_midi_output_is_cleared_each_callback() {
    let mut engine = MockEngine::new(TEST_BLOCK_SIZE);
    engine.emit_at(0, Emission::Midi(MidiMessage::ProgramChange { channel: 0, program: 9 }));
    let context = test_context(engine);
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);

    instance.process(&mut host, TEST_BUFFER_SIZE);
    assert_eq!(host.midi_output(port::MIDI_OUT), vec![(0, vec![0xC0, 9])]);

    host.prepare_outputs();
    instance.process(&mut host, TEST_BUFFER_SIZE);
    assert!(host.midi_output(port::MIDI_OUT).is_empty());
}

#[test]
fn test_unconnected_midi_ports_are_skipped() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    host.disconnect(port::MIDI_IN);
    host.disconnect(port::MIDI_OUT);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    assert!(host.midi_output(port::MIDI_OUT).is_empty());
    let fresh = MockHost::new(&table, TEST_BUFFER_SIZE);
    assert!(fresh.midi_output(port::MIDI_OUT).is_empty());
}

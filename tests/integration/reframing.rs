//! Reframing integration tests
//!
//! Host callbacks of arbitrary size against the engine's fixed block size,
//! in both remainder modes.

use proptest::prelude::*;

use pdbridge::core::mock::{MockEngine, MockHost};
use pdbridge::prelude::*;

use crate::helpers::*;

#[test]
fn test_whole_blocks_pass_through_in_place() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = stereo_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);
    let left = ramp(0, TEST_BUFFER_SIZE);
    let right = generate_sine(440.0, 48_000.0, TEST_BUFFER_SIZE);
    host.audio_mut(port::IN_L).copy_from_slice(&left);
    host.audio_mut(port::IN_R).copy_from_slice(&right);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    assert_eq!(instance.latency(), 0);
    assert_buffers_equal(host.audio(port::OUT_L), &left, "left");
    assert_buffers_equal(host.audio(port::OUT_R), &right, "right");
    assert_eq!(
        context.with_engine(|engine| engine.processed()),
        TEST_BUFFER_SIZE / TEST_BLOCK_SIZE
    );
}

#[test]
fn test_silence_mode_zeroes_the_remainder() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let frames = 3 * TEST_BLOCK_SIZE + 17;
    let (mut instance, mut host) = running_instance(&context, &table, frames);
    host.audio_mut(0).copy_from_slice(&ramp(1, frames));
    host.audio_mut(1).fill(9.0);

    instance.process(&mut host, frames);

    let whole = 3 * TEST_BLOCK_SIZE;
    assert_eq!(context.with_engine(|engine| engine.processed()), 3);
    assert_buffers_equal(&host.audio(1)[..whole], &ramp(1, whole), "whole blocks");
    assert_silent(&host.audio(1)[whole..], "remainder");
}

#[test]
fn test_short_callback_runs_no_block_in_silence_mode() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BLOCK_SIZE - 1);
    host.audio_mut(0).fill(1.0);

    instance.process(&mut host, TEST_BLOCK_SIZE - 1);

    assert_eq!(context.with_engine(|engine| engine.processed()), 0);
    assert_silent(host.audio(1), "short callback");
}

/// Run `sizes` callbacks through a buffered mono instance; returns
/// everything the host received.
fn run_buffered(sizes: &[usize]) -> (Vec<f32>, Vec<f32>, usize) {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let config = BridgeConfig::default().remainder(RemainderPolicy::Buffered);
    let mut instance = open_instance_with(&context, &table, &config);
    instance.activate();

    let mut sent = Vec::new();
    let mut received = Vec::new();
    let mut host = MockHost::new(&table, 0);
    for &frames in sizes {
        host.set_frames(frames);
        let input = ramp(sent.len() + 1, frames);
        host.audio_mut(0).copy_from_slice(&input);
        instance.process(&mut host, frames);
        sent.extend_from_slice(&input);
        received.extend_from_slice(host.audio(1));
    }
    (sent, received, instance.latency())
}

#[test]
fn test_buffered_mode_delays_by_one_block() {
    let (sent, received, latency) = run_buffered(&[50, 100, 30, 64, 1, 200]);
    assert_eq!(latency, TEST_BLOCK_SIZE);
    assert_silent(&received[..latency], "latency");
    assert_buffers_equal(&received[latency..], &sent[..sent.len() - latency], "delayed stream");
}

proptest! {
    #[test]
    fn whole_block_callbacks_run_one_engine_block_each(blocks in 1usize..8, callbacks in 1usize..4) {
        let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
        let table = mono_table();
        let frames = blocks * TEST_BLOCK_SIZE;
        let (mut instance, mut host) = running_instance(&context, &table, frames);

        for n in 0..callbacks {
            let input = ramp(n * frames, frames);
            host.audio_mut(0).copy_from_slice(&input);
            instance.process(&mut host, frames);
            prop_assert_eq!(host.audio(1), &input[..]);
        }
        prop_assert_eq!(context.with_engine(|engine| engine.processed()), blocks * callbacks);
    }

    #[test]
    fn buffered_output_is_input_delayed(sizes in prop::collection::vec(1usize..300, 1..12)) {
        let (sent, received, latency) = run_buffered(&sizes);
        prop_assert_eq!(received.len(), sent.len());
        let shown = received.len().saturating_sub(latency);
        prop_assert!(received[..received.len().min(latency)].iter().all(|&s| s == 0.0));
        prop_assert_eq!(&received[latency.min(received.len())..], &sent[..shown]);
    }
}

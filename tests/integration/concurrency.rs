//! Concurrency integration tests
//!
//! Several instances share one engine from their own threads. The engine is
//! entered by one instance at a time, and nothing it reports leaks into
//! another instance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use pdbridge::core::mock::MockEngine;
use pdbridge::core::ActiveInstance;

use crate::helpers::*;

const THREADS: usize = 4;
const CALLBACKS: usize = 200;

#[test]
fn test_instances_never_share_the_engine() {
    let hooks = Arc::new(ActiveInstance::new());
    let overlaps = Arc::new(AtomicUsize::new(0));
    let idle_blocks = Arc::new(AtomicUsize::new(0));
    let inside = Arc::new(AtomicBool::new(false));

    let engine = {
        let hooks = hooks.clone();
        let overlaps = overlaps.clone();
        let idle_blocks = idle_blocks.clone();
        let inside = inside.clone();
        MockEngine::new(TEST_BLOCK_SIZE)
            .echo_bound_floats()
            .with_hook_target(hooks.clone())
            .with_processor(move |input, output| {
                if inside.swap(true, Ordering::AcqRel) {
                    overlaps.fetch_add(1, Ordering::Relaxed);
                }
                if hooks.is_idle() {
                    idle_blocks.fetch_add(1, Ordering::Relaxed);
                }
                let n = input.len().min(output.len());
                output[..n].copy_from_slice(&input[..n]);
                inside.store(false, Ordering::Release);
            })
    };
    let context = test_context(engine);
    let table = stereo_table();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let context = &context;
            let table = &table;
            scope.spawn(move || {
                let (mut instance, mut host) = running_instance(context, table, TEST_BUFFER_SIZE);
                let own = 0.25 * (t + 1) as f32;
                host.set_control(port::WIDTH_IN, own);
                let signal = ramp(t * 1000, TEST_BUFFER_SIZE);
                for _ in 0..CALLBACKS {
                    host.audio_mut(port::IN_L).copy_from_slice(&signal);
                    instance.process(&mut host, TEST_BUFFER_SIZE);
                    assert_eq!(host.control(port::WIDTH_OUT), Some(own));
                    assert_buffers_equal(host.audio(port::OUT_L), &signal, "own audio");
                }
            });
        }
    });

    assert_eq!(overlaps.load(Ordering::Relaxed), 0);
    assert_eq!(idle_blocks.load(Ordering::Relaxed), 0);
    assert!(hooks.is_idle());
    assert_eq!(
        context.with_engine(|engine| engine.processed()),
        THREADS * CALLBACKS * TEST_BUFFER_SIZE / TEST_BLOCK_SIZE
    );
}

#[test]
fn test_owner_is_cleared_between_sections() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let (mut instance, mut host) = running_instance(&context, &table, TEST_BUFFER_SIZE);

    instance.process(&mut host, TEST_BUFFER_SIZE);

    let active = context.active();
    assert!(active.is_idle());
    assert_eq!(active.owner(), None);
    assert!(!context.is_locked());
}

#[test]
fn test_instances_on_threads_keep_distinct_tokens() {
    let context = test_context(MockEngine::new(TEST_BLOCK_SIZE));
    let table = mono_table();
    let tokens: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| open_instance(&context, &table).token()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let mut unique = tokens.clone();
    unique.sort_by_key(|token| token.get());
    unique.dedup();
    assert_eq!(unique.len(), THREADS);
}

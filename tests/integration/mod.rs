//! Integration test modules for pdbridge
//!
//! Test categories:
//! - lifecycle: open, activate, process before activation, teardown
//! - controls: routed names, control round-trip, isolation between instances
//! - midi: ingress decoding and timing, egress stamping
//! - reframing: host callbacks of any size against fixed engine blocks
//! - concurrency: several instances sharing one engine from many threads

pub mod concurrency;
pub mod controls;
pub mod lifecycle;
pub mod midi;
pub mod reframing;

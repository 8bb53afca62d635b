//! Instance bridging and block reframing for pdbridge
//!
//! A patch engine such as libpd keeps one process-global, non-reentrant
//! context and a fixed block size, while a plugin host runs any number of
//! instances with arbitrary callback lengths. This crate reconciles the two:
//!
//! - **Serialization**: [`EngineContext`] puts the engine behind a spin lock
//!   and routes its free-function hooks to the instance currently inside
//!   (see [`ActiveInstance`])
//! - **Namespacing**: control ports are addressed on the engine bus as
//!   `"{instantiation id}-lv2-{port name}"` ([`NamespaceRouter`])
//! - **Reframing**: host callbacks are cut into engine blocks
//!   ([`BlockReframer`], [`RemainderPolicy`])
//! - **MIDI**: atom sequences in and out ([`MidiIngress`], [`MidiEgress`])
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdbridge_core::{BridgeConfig, EngineContext, Instance, PortSpec, PortTable};
//!
//! let context = Arc::new(EngineContext::new(engine));
//! let table = Arc::new(PortTable::new(&[
//!     PortSpec::audio_in("in"),
//!     PortSpec::audio_out("out"),
//!     PortSpec::control_in("width").with_range(0.0, 0.5, 1.0),
//! ]));
//!
//! let mut instance = Instance::open(context, table, bundle_dir, urids, &BridgeConfig::default())?;
//! instance.activate();
//! instance.process(&mut host_ports, frames);
//! ```

pub mod error;
pub use error::{BridgeError, LoadStage, Result};

mod config;
pub use config::{default_engine_library, BridgeConfig, RemainderPolicy};

pub mod atom;
pub use atom::Urids;

mod control;
pub use control::{ControlValuePump, RoutedControl};

mod engine;
pub use engine::{Engine, EngineListener, NullListener};

mod guard;
pub use guard::{ActiveInstance, EngineContext, InstanceToken, RawSpinLock, Session, SpinMutex};

mod host;
pub use host::HostPorts;

mod instance;
pub use instance::Instance;

mod midi_bridge;
pub use midi_bridge::{dispatch as dispatch_midi, MidiEgress, MidiIngress};

mod namespace;
pub use namespace::{route, NamespaceRouter, SEPARATOR};

mod outputs;
pub use outputs::{EngineOutputs, MidiEventVec};

mod port;
pub use port::{ControlRange, Port, PortKind, PortSpec, PortTable};

mod reframe;
pub use reframe::{BlockReframer, Chunk};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use pdbridge_midi as midi;

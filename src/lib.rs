//! # pdbridge - Pure Data patches as LV2 plugins
//!
//! Runs a Pure Data patch inside an audio plugin host by driving libpd, a
//! process-global engine, from any number of plugin instances.
//!
//! ## Architecture
//!
//! pdbridge is an umbrella crate that coordinates:
//! - **pdbridge-midi** - MIDI 1.0 channel and realtime message codec
//! - **pdbridge-core** - Port tables, the engine critical section, block
//!   reframing, control and MIDI routing, the per-plugin `Instance`
//! - **pdbridge-libpd** - libpd loaded at runtime as the engine
//! - **pdbridge-lv2** - LV2 descriptor, callbacks and `export_lv2_plugin!`
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdbridge::prelude::*;
//!
//! pdbridge::export_lv2_plugin! {
//!     pub struct Stereo;
//!     uri: "https://example.org/plugins/stereo",
//!     ports: [
//!         PortSpec::audio_in("in_l"),
//!         PortSpec::audio_in("in_r"),
//!         PortSpec::audio_out("out_l"),
//!         PortSpec::audio_out("out_r"),
//!         PortSpec::control_in("width").with_range(0.0, 1.0, 2.0),
//!         PortSpec::midi_in("midi_in"),
//!     ],
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - libpd engine and LV2 surface
//! - `libpd` - runtime-loaded libpd engine
//! - `lv2` - LV2 plugin ABI surface

mod error;
pub use error::{Error, Result};

/// Re-export of pdbridge-core for direct access
pub use pdbridge_core as core;

/// Re-export of pdbridge-midi for direct access
pub use pdbridge_midi as midi;

pub use pdbridge_core::{
    BlockReframer, BridgeConfig, BridgeError, ControlRange, ControlValuePump, Engine, EngineContext,
    EngineListener, HostPorts, Instance, InstanceToken, LoadStage, NamespaceRouter, Port, PortKind,
    PortSpec, PortTable, RemainderPolicy, Urids,
};

pub use pdbridge_midi::{MidiEvent, MidiMessage};

#[cfg(feature = "libpd")]
pub use pdbridge_libpd as libpd;

#[cfg(feature = "libpd")]
pub use pdbridge_libpd::{shared_context, LibPd};

#[cfg(feature = "lv2")]
pub use pdbridge_lv2 as lv2;

#[cfg(feature = "lv2")]
pub use pdbridge_lv2::{export_lv2_plugin, Descriptor, PluginDefinition};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, ControlRange, Instance, PortKind, PortSpec, PortTable, RemainderPolicy,
    };

    pub use crate::{MidiEvent, MidiMessage};

    pub use crate::{Error, Result};
}

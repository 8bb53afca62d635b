//! LV2 plugin surface for pdbridge.
//!
//! A plugin crate builds as a `cdylib` and invokes [`export_lv2_plugin!`]
//! once. The bundle next to the library holds the patch and the libpd
//! shared library; the host must offer `urid:map`.
//!
//! Set `PDBRIDGE_LOG` (an `EnvFilter` directive such as `debug`) to see
//! bridge logs and the patch's `print` output on stderr.

mod macros;

pub mod logging;
mod plugin;
mod ports;
pub mod urid;

pub use plugin::{build_port_table, Descriptor, Plugin, PluginDefinition};
pub use ports::ConnectedPorts;

pub use lv2_raw::LV2Descriptor;

pub use pdbridge_core as bridge;

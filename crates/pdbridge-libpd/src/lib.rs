//! libpd, loaded at runtime from the plugin bundle, as the pdbridge engine.
//!
//! The library is opened and initialised once per process by
//! [`shared_context`]; every plugin instance then shares the returned
//! [`EngineContext`](pdbridge_core::EngineContext).
//!
//! ```ignore
//! use pdbridge_core::BridgeConfig;
//!
//! let config = BridgeConfig::default();
//! let context = pdbridge_libpd::shared_context(bundle_dir, &config, 48_000.0, 2, 2)?;
//! ```

mod engine;
pub mod hooks;
mod symbols;

pub use engine::{library_path, shared_context, LibPd, LibPdBinding, LibPdPatch};

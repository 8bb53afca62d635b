//! Bridge configuration.

use crate::error::{BridgeError, Result};

/// What to do with the `frames % block_size` tail of a host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderPolicy {
    /// Process whole engine blocks only and write silence over the tail.
    /// No added latency.
    #[default]
    Silence,
    /// Carry partial blocks across callbacks. Accepts any frame count at the
    /// cost of one engine block of output latency.
    Buffered,
}

/// Configuration for one bridged plugin type.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Patch opened from the bundle directory.
    pub patch_file: String,
    /// Engine shared library, resolved against the bundle directory.
    pub engine_library: String,
    pub remainder: RemainderPolicy,
    /// Engine MIDI events staged per callback before further ones are dropped.
    pub midi_output_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            patch_file: "host.pd".to_string(),
            engine_library: default_engine_library(),
            remainder: RemainderPolicy::default(),
            midi_output_capacity: 256,
        }
    }
}

/// Platform file name of the `pd` shared library.
pub fn default_engine_library() -> String {
    format!(
        "{}pd{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

impl BridgeConfig {
    pub fn patch_file(mut self, file: impl Into<String>) -> Self {
        self.patch_file = file.into();
        self
    }

    pub fn engine_library(mut self, library: impl Into<String>) -> Self {
        self.engine_library = library.into();
        self
    }

    pub fn remainder(mut self, policy: RemainderPolicy) -> Self {
        self.remainder = policy;
        self
    }

    pub fn midi_output_capacity(mut self, capacity: usize) -> Self {
        self.midi_output_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.patch_file.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "patch_file must not be empty".to_string(),
            ));
        }
        if self.engine_library.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "engine_library must not be empty".to_string(),
            ));
        }
        if self.midi_output_capacity == 0 {
            return Err(BridgeError::InvalidConfig(
                "midi_output_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

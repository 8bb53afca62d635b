//! Reasons an incoming MIDI event is not forwarded as a typed message.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty MIDI event")]
    Empty,

    #[error("data byte {0:#04x} without status (running status is not supported)")]
    RunningStatus(u8),

    #[error("status {status:#04x} needs {expected} bytes, got {got}")]
    Truncated { status: u8, expected: usize, got: usize },

    #[error("system exclusive messages are not supported")]
    SystemExclusive,

    #[error("unsupported system message {0:#04x}")]
    UnsupportedSystem(u8),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

//! Centralized error type for the pdbridge umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Bridge(#[from] pdbridge_core::BridgeError),

    #[error("MIDI: {0}")]
    Midi(#[from] pdbridge_midi::DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;

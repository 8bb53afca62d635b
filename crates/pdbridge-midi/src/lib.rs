//! MIDI wire model for pdbridge.
//!
//! Host plugin ports carry raw MIDI bytes; the embedded engine speaks one call
//! per message kind. This crate sits between the two:
//!
//! - [`MidiMessage::decode`] turns the raw bytes of one host event into a typed
//!   message (or a [`DecodeError`] for anything the bridge drops on purpose).
//! - [`MidiMessage::encode`] turns a message reported by the engine back into
//!   wire bytes ([`RawMidi`]).
//! - [`MidiEvent`] stamps a message with its frame offset and source port.
//!
//! Channels are folded onto 0-7 in both directions (see [`CHANNEL_MASK`]).

pub mod error;
pub use error::{DecodeError, Result};

mod message;
pub use message::{MidiMessage, RawMidi, Realtime, CHANNEL_MASK, PITCH_BEND_CENTER};

mod event;
pub use event::MidiEvent;

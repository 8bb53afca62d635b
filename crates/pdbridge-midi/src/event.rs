//! Frame-stamped MIDI events.

use crate::error::Result;
use crate::message::MidiMessage;

/// A decoded message with its position inside the current host callback.
///
/// Lives only for one processing callback; never retained across calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset within the current callback (0 = first frame).
    pub frame_offset: u32,
    /// Ordinal of the MIDI port among ports of the same direction.
    pub port: u8,
    pub message: MidiMessage,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: u32, port: u8, message: MidiMessage) -> Self {
        Self {
            frame_offset,
            port,
            message,
        }
    }

    /// Decode one host event body.
    pub fn decode(frame_offset: u32, port: u8, bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(frame_offset, port, MidiMessage::decode(bytes)?))
    }

    #[inline]
    pub fn note_on(frame_offset: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            frame_offset,
            0,
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            },
        )
    }

    #[inline]
    pub fn control_change(frame_offset: u32, channel: u8, control: u8, value: u8) -> Self {
        Self::new(
            frame_offset,
            0,
            MidiMessage::ControlChange {
                channel,
                control,
                value,
            },
        )
    }

    #[inline]
    pub fn on_port(mut self, port: u8) -> Self {
        self.port = port;
        self
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.message, MidiMessage::NoteOn { velocity, .. } if velocity > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.message,
            MidiMessage::NoteOff { .. } | MidiMessage::NoteOn { velocity: 0, .. }
        )
    }
}

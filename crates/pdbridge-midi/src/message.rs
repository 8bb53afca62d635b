//! Channel-voice and realtime messages as the engine sees them.

use crate::error::{DecodeError, Result};

/// Mask applied to the status byte's channel nibble in both directions.
///
/// Only three bits survive, so channels 8-15 fold onto 0-7. Existing patches
/// rely on this numbering; widening it to `0x0F` changes which channel a
/// patch sees for every message above channel 7.
pub const CHANNEL_MASK: u8 = 0x07;

/// Raw 14-bit pitch bend value that decodes to a bend of zero.
pub const PITCH_BEND_CENTER: u16 = 8192;

const DATA_MASK: u8 = 0x7F;

/// System realtime messages forwarded to the engine as a single byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Realtime {
    Clock = 0xF8,
    Start = 0xFA,
    Continue = 0xFB,
    Stop = 0xFC,
    ActiveSensing = 0xFE,
    Reset = 0xFF,
}

impl Realtime {
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0xF8 => Some(Self::Clock),
            0xFA => Some(Self::Start),
            0xFB => Some(Self::Continue),
            0xFC => Some(Self::Stop),
            0xFE => Some(Self::ActiveSensing),
            0xFF => Some(Self::Reset),
            _ => None,
        }
    }

    #[inline]
    pub fn status(self) -> u8 {
        self as u8
    }
}

/// One decoded MIDI message. Channels are already masked with [`CHANNEL_MASK`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    /// Release velocity is discarded; the engine receives a zero-velocity note on.
    NoteOff { channel: u8, note: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, pressure: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// Signed bend, -8192..=8191, zero at center.
    PitchBend { channel: u8, value: i16 },
    Realtime(Realtime),
}

impl MidiMessage {
    /// Decode the bytes of a single host MIDI event.
    ///
    /// System exclusive, system common and undefined system bytes are
    /// rejected; so is an event that starts with a data byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let &status = bytes.first().ok_or(DecodeError::Empty)?;
        if status < 0x80 {
            return Err(DecodeError::RunningStatus(status));
        }

        if status >= 0xF0 {
            return match status {
                0xF0 => Err(DecodeError::SystemExclusive),
                _ => Realtime::from_status(status)
                    .map(MidiMessage::Realtime)
                    .ok_or(DecodeError::UnsupportedSystem(status)),
            };
        }

        let expected = match status & 0xF0 {
            0xC0 | 0xD0 => 2,
            _ => 3,
        };
        if bytes.len() < expected {
            return Err(DecodeError::Truncated {
                status,
                expected,
                got: bytes.len(),
            });
        }

        let channel = status & CHANNEL_MASK;
        let data1 = bytes[1] & DATA_MASK;
        let data2 = bytes.get(2).map_or(0, |b| b & DATA_MASK);

        let message = match status & 0xF0 {
            0x80 => MidiMessage::NoteOff {
                channel,
                note: data1,
            },
            0x90 => MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            0xA0 => MidiMessage::PolyPressure {
                channel,
                note: data1,
                pressure: data2,
            },
            0xB0 => MidiMessage::ControlChange {
                channel,
                control: data1,
                value: data2,
            },
            0xC0 => MidiMessage::ProgramChange {
                channel,
                program: data1,
            },
            0xD0 => MidiMessage::ChannelPressure {
                channel,
                pressure: data1,
            },
            // 0xE0: the only status nibble left below 0xF0
            _ => {
                let raw = ((data2 as u16) << 7) | data1 as u16;
                MidiMessage::PitchBend {
                    channel,
                    value: raw as i16 - PITCH_BEND_CENTER as i16,
                }
            }
        };
        Ok(message)
    }

    /// Encode for the host. Channel is masked to 3 bits, data bytes to 7 bits,
    /// and pitch bend is re-biased and clamped to the 14-bit range.
    pub fn encode(&self) -> RawMidi {
        let status = |nibble: u8, channel: u8| nibble | (channel & CHANNEL_MASK);
        match *self {
            MidiMessage::NoteOff { channel, note } => {
                RawMidi::three(status(0x80, channel), note, 0)
            }
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => RawMidi::three(status(0x90, channel), note, velocity),
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => RawMidi::three(status(0xA0, channel), note, pressure),
            MidiMessage::ControlChange {
                channel,
                control,
                value,
            } => RawMidi::three(status(0xB0, channel), control, value),
            MidiMessage::ProgramChange { channel, program } => {
                RawMidi::two(status(0xC0, channel), program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                RawMidi::two(status(0xD0, channel), pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                let raw = (value as i32 + PITCH_BEND_CENTER as i32).clamp(0, 0x3FFF) as u16;
                RawMidi::three(
                    status(0xE0, channel),
                    (raw & 0x7F) as u8,
                    ((raw >> 7) & 0x7F) as u8,
                )
            }
            MidiMessage::Realtime(rt) => RawMidi::one(rt.status()),
        }
    }

    /// Status byte without channel (`0x80`..`0xE0`), or the full realtime byte.
    pub fn status(&self) -> u8 {
        let byte = self.encode().data[0];
        match self {
            MidiMessage::Realtime(_) => byte,
            _ => byte & 0xF0,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::Realtime(_) => None,
        }
    }
}

/// Up to three wire bytes for one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawMidi {
    pub data: [u8; 3],
    /// Valid bytes in `data` (1-3).
    pub len: u8,
}

impl RawMidi {
    #[inline]
    fn one(status: u8) -> Self {
        Self {
            data: [status, 0, 0],
            len: 1,
        }
    }

    #[inline]
    fn two(status: u8, data1: u8) -> Self {
        Self {
            data: [status, data1 & DATA_MASK, 0],
            len: 2,
        }
    }

    #[inline]
    fn three(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            data: [status, data1 & DATA_MASK, data2 & DATA_MASK],
            len: 3,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

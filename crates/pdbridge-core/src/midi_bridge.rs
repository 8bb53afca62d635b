//! MIDI between host atom sequences and the engine's per-message calls.
//!
//! Ingress decodes every MIDI input port before the first engine block and
//! hands each event to the engine right before the block containing its
//! frame. Egress appends what the engine emitted during the callback to every
//! MIDI output port, time-stamped with the block that produced it.

use pdbridge_midi::MidiMessage;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::atom::{SequenceReader, SequenceWriter, Urids};
use crate::engine::Engine;
use crate::host::HostPorts;
use crate::outputs::EngineOutputs;

#[derive(Clone, Copy, Debug)]
struct PendingMidi {
    frame: u32,
    port: u8,
    start: u32,
    len: u32,
}

/// Host MIDI collected for one callback, awaiting delivery.
#[derive(Debug, Default)]
pub struct MidiIngress {
    pending: SmallVec<[PendingMidi; 64]>,
    bytes: Vec<u8>,
    cursor: usize,
}

impl MidiIngress {
    pub fn new() -> Self {
        Self {
            pending: SmallVec::new(),
            bytes: Vec::with_capacity(1024),
            cursor: 0,
        }
    }

    /// Read every MIDI event from `ports` (host indices of the MIDI inputs,
    /// in declaration order) and order them by frame. Ties keep port order.
    pub fn collect<H: HostPorts + ?Sized>(&mut self, host: &H, ports: &[usize], urids: &Urids) {
        self.pending.clear();
        self.bytes.clear();
        self.cursor = 0;

        for (ordinal, &port) in ports.iter().enumerate() {
            let Some(buf) = host.atom_input(port) else {
                continue;
            };
            let Some(reader) = SequenceReader::new(buf, urids) else {
                trace!(port, "MIDI input is not a frame-timed sequence");
                continue;
            };
            for event in reader {
                if event.type_urid != urids.midi_event || event.body.is_empty() {
                    continue;
                }
                let start = self.bytes.len() as u32;
                self.bytes.extend_from_slice(event.body);
                self.pending.push(PendingMidi {
                    frame: event.frames.clamp(0, i64::from(u32::MAX)) as u32,
                    port: u8::try_from(ordinal).unwrap_or(u8::MAX),
                    start,
                    len: event.body.len() as u32,
                });
            }
        }

        self.pending.sort_unstable_by_key(|event| (event.frame, event.start));
    }

    /// Events not yet delivered.
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.cursor
    }

    /// Deliver every pending event with a frame before `end`.
    pub fn deliver_until<E: Engine + ?Sized>(&mut self, engine: &mut E, end: usize) {
        while let Some(&event) = self.pending.get(self.cursor) {
            if event.frame as usize >= end {
                break;
            }
            self.cursor += 1;
            let bytes = &self.bytes[event.start as usize..(event.start + event.len) as usize];
            deliver(engine, event.port, bytes);
        }
    }

    /// Deliver everything still pending.
    pub fn deliver_rest<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        self.deliver_until(engine, usize::MAX);
    }
}

/// Forward one host event: every raw byte to the engine's parser, then the
/// decoded message to its typed entry point.
fn deliver<E: Engine + ?Sized>(engine: &mut E, port: u8, bytes: &[u8]) {
    for &byte in bytes {
        engine.midi_byte(port, byte);
    }
    match MidiMessage::decode(bytes) {
        Ok(message) => dispatch(engine, port, message),
        Err(err) => trace!(port, %err, "Dropping MIDI event"),
    }
}

/// Call the engine entry point for `message`. Note-off becomes a
/// zero-velocity note-on.
pub fn dispatch<E: Engine + ?Sized>(engine: &mut E, port: u8, message: MidiMessage) {
    match message {
        MidiMessage::NoteOff { channel, note } => engine.note_on(channel, note, 0),
        MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        } => engine.note_on(channel, note, velocity),
        MidiMessage::PolyPressure {
            channel,
            note,
            pressure,
        } => engine.poly_aftertouch(channel, note, pressure),
        MidiMessage::ControlChange {
            channel,
            control,
            value,
        } => engine.control_change(channel, control, value),
        MidiMessage::ProgramChange { channel, program } => engine.program_change(channel, program),
        MidiMessage::ChannelPressure { channel, pressure } => engine.aftertouch(channel, pressure),
        MidiMessage::PitchBend { channel, value } => engine.pitch_bend(channel, value),
        MidiMessage::Realtime(realtime) => engine.sys_realtime(port, realtime.status()),
    }
}

/// Sequence writers for every MIDI output port of one callback.
#[derive(Debug, Default)]
pub struct MidiEgress {
    writers: Vec<Option<SequenceWriter>>,
    overflow_warned: bool,
}

impl MidiEgress {
    pub fn new(ports: usize) -> Self {
        Self {
            writers: Vec::with_capacity(ports),
            overflow_warned: false,
        }
    }

    /// Open an empty sequence on every output port.
    pub fn begin<H: HostPorts + ?Sized>(&mut self, host: &mut H, ports: &[usize], urids: &Urids) {
        self.writers.clear();
        for &port in ports {
            let writer = host
                .atom_output(port)
                .and_then(|buf| SequenceWriter::begin(buf, urids));
            self.writers.push(writer);
        }
    }

    /// Append the staged events to every open sequence and close them.
    ///
    /// Events refused by the staging buffer or by a full sequence are
    /// reported once per instance.
    pub fn finish<H: HostPorts + ?Sized>(
        &mut self,
        host: &mut H,
        ports: &[usize],
        urids: &Urids,
        outputs: &EngineOutputs,
    ) {
        let mut dropped = outputs.dropped();
        for (writer, &port) in self.writers.drain(..).zip(ports) {
            let (Some(mut writer), Some(buf)) = (writer, host.atom_output(port)) else {
                continue;
            };
            for event in outputs.midi_events() {
                let raw = event.message.encode();
                writer.append(buf, i64::from(event.frame_offset), urids.midi_event, raw.as_bytes());
            }
            dropped += writer.dropped();
            writer.finish(buf);
        }
        if dropped > 0 && !self.overflow_warned {
            self.overflow_warned = true;
            warn!(dropped, "MIDI output full; dropping events");
        }
    }

    /// Whether an output overflow has been reported.
    pub fn overflow_warned(&self) -> bool {
        self.overflow_warned
    }
}

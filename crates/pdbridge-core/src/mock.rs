//! In-memory engine and host buffers for tests.
//!
//! [`MockEngine`] records every call and reports scripted output through
//! its [`ActiveInstance`] exactly as a real engine's hooks would.
//! [`MockHost`] owns one buffer per port of a [`PortTable`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use pdbridge_midi::MidiMessage;

use crate::atom::{declare_capacity, SequenceReader, SequenceWriter, Urids};
use crate::engine::Engine;
use crate::error::{BridgeError, LoadStage, Result};
use crate::guard::ActiveInstance;
use crate::host::HostPorts;
use crate::port::{PortKind, PortTable};

pub const MOCK_URIDS: Urids = Urids {
    atom_sequence: 1,
    atom_frame_time: 2,
    midi_event: 3,
};

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    OpenPatch { file: String, id: i32 },
    ClosePatch(i32),
    Select(i32),
    Process,
    Float { receiver: String, value: f32 },
    Message { receiver: String, selector: String, args: Vec<f32> },
    Bind(String),
    Unbind(String),
    MidiByte { port: u8, byte: u8 },
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: i16 },
    Aftertouch { channel: u8, value: u8 },
    PolyAftertouch { channel: u8, pitch: u8, value: u8 },
    SysRealtime { port: u8, byte: u8 },
}

/// Output the mock reports while processing a block.
#[derive(Clone, Debug, PartialEq)]
pub enum Emission {
    Float(String, f32),
    Midi(MidiMessage),
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockPatch {
    id: i32,
}

impl MockPatch {
    pub fn id(&self) -> i32 {
        self.id
    }
}

#[derive(Debug)]
pub struct MockBinding {
    receiver: String,
}

type Processor = Box<dyn FnMut(&[f32], &mut [f32]) + Send>;

pub struct MockEngine {
    hooks: Arc<ActiveInstance>,
    block_size: usize,
    next_id: i32,
    ids: VecDeque<i32>,
    missing: Vec<String>,
    unbindable: Vec<String>,
    calls: Vec<EngineCall>,
    open: Vec<i32>,
    bound: Vec<String>,
    echo: bool,
    echoes: Vec<(String, f32)>,
    script: Vec<(usize, Emission)>,
    processed: usize,
    processor: Option<Processor>,
}

impl MockEngine {
    pub fn new(block_size: usize) -> Self {
        Self {
            hooks: Arc::new(ActiveInstance::new()),
            block_size,
            next_id: 1001,
            ids: VecDeque::new(),
            missing: Vec::new(),
            unbindable: Vec::new(),
            calls: Vec::new(),
            open: Vec::new(),
            bound: Vec::new(),
            echo: false,
            echoes: Vec::new(),
            script: Vec::new(),
            processed: 0,
            processor: None,
        }
    }

    /// Hand out these instantiation ids before counting up from 1001.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Opening `file` fails.
    pub fn missing_patch(mut self, file: impl Into<String>) -> Self {
        self.missing.push(file.into());
        self
    }

    /// Binding `receiver` fails.
    pub fn unbindable(mut self, receiver: impl Into<String>) -> Self {
        self.unbindable.push(receiver.into());
        self
    }

    /// Floats sent to a bound receiver come back out on it during the next
    /// processed block, like a patch wiring `[r name]` to `[s name]`.
    pub fn echo_bound_floats(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Share an existing hook cell, e.g. one that free-function hooks read.
    pub fn with_hook_target(mut self, hooks: Arc<ActiveInstance>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the default passthrough DSP.
    pub fn with_processor(mut self, f: impl FnMut(&[f32], &mut [f32]) + Send + 'static) -> Self {
        self.processor = Some(Box::new(f));
        self
    }

    /// Report `emission` while processing the engine-wide block number
    /// `block` (counting from zero).
    pub fn emit_at(&mut self, block: usize, emission: Emission) {
        self.script.push((block, emission));
    }

    /// Report `emission` during the next processed block.
    pub fn emit_next(&mut self, emission: Emission) {
        self.script.push((self.processed, emission));
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn open_patches(&self) -> &[i32] {
        &self.open
    }

    pub fn bound(&self) -> &[String] {
        &self.bound
    }

    fn report(&self, emission: &Emission) {
        // SAFETY: only called from Engine methods, which run with the
        // engine lock held.
        unsafe {
            self.hooks.dispatch(|listener| match emission {
                Emission::Float(name, value) => listener.float_received(name, *value),
                Emission::Midi(message) => listener.midi_received(*message),
            });
        }
    }
}

impl Engine for MockEngine {
    type Patch = MockPatch;
    type Binding = MockBinding;

    fn hook_target(&self) -> Arc<ActiveInstance> {
        self.hooks.clone()
    }

    fn open_patch(&mut self, file: &str, dir: &Path) -> Result<MockPatch> {
        if self.missing.iter().any(|missing| missing == file) {
            return Err(BridgeError::load_failed(
                dir.join(file),
                LoadStage::Patch,
                "no such patch",
            ));
        }
        let id = self.ids.pop_front().unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });
        self.open.push(id);
        self.calls.push(EngineCall::OpenPatch {
            file: file.to_string(),
            id,
        });
        Ok(MockPatch { id })
    }

    fn close_patch(&mut self, patch: MockPatch) {
        self.open.retain(|&id| id != patch.id);
        self.calls.push(EngineCall::ClosePatch(patch.id));
    }

    fn instantiation_id(&self, patch: &MockPatch) -> i32 {
        patch.id
    }

    fn select(&mut self, patch: &MockPatch) {
        self.calls.push(EngineCall::Select(patch.id));
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn process_raw(&mut self, input: &[f32], output: &mut [f32]) {
        self.calls.push(EngineCall::Process);
        let block = self.processed;
        self.processed += 1;

        for (name, value) in std::mem::take(&mut self.echoes) {
            self.report(&Emission::Float(name, value));
        }
        for (_, emission) in self.script.iter().filter(|(at, _)| *at == block) {
            self.report(emission);
        }

        match self.processor.as_mut() {
            Some(processor) => processor(input, output),
            None => {
                let n = input.len().min(output.len());
                output[..n].copy_from_slice(&input[..n]);
            }
        }
    }

    fn send_float(&mut self, receiver: &str, value: f32) {
        self.calls.push(EngineCall::Float {
            receiver: receiver.to_string(),
            value,
        });
        if self.echo && self.bound.iter().any(|bound| bound == receiver) {
            self.echoes.push((receiver.to_string(), value));
        }
    }

    fn send_message(&mut self, receiver: &str, selector: &str, args: &[f32]) {
        self.calls.push(EngineCall::Message {
            receiver: receiver.to_string(),
            selector: selector.to_string(),
            args: args.to_vec(),
        });
    }

    fn bind(&mut self, receiver: &str) -> Result<MockBinding> {
        if self.unbindable.iter().any(|name| name == receiver) {
            return Err(BridgeError::load_failed(
                receiver,
                LoadStage::Binding,
                "receiver refused",
            ));
        }
        self.bound.push(receiver.to_string());
        self.calls.push(EngineCall::Bind(receiver.to_string()));
        Ok(MockBinding {
            receiver: receiver.to_string(),
        })
    }

    fn unbind(&mut self, binding: MockBinding) {
        if let Some(at) = self.bound.iter().position(|name| *name == binding.receiver) {
            self.bound.remove(at);
        }
        self.calls.push(EngineCall::Unbind(binding.receiver));
    }

    fn midi_byte(&mut self, port: u8, byte: u8) {
        self.calls.push(EngineCall::MidiByte { port, byte });
    }

    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        self.calls.push(EngineCall::NoteOn {
            channel,
            pitch,
            velocity,
        });
    }

    fn control_change(&mut self, channel: u8, control: u8, value: u8) {
        self.calls.push(EngineCall::ControlChange {
            channel,
            control,
            value,
        });
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        self.calls.push(EngineCall::ProgramChange { channel, program });
    }

    fn pitch_bend(&mut self, channel: u8, value: i16) {
        self.calls.push(EngineCall::PitchBend { channel, value });
    }

    fn aftertouch(&mut self, channel: u8, value: u8) {
        self.calls.push(EngineCall::Aftertouch { channel, value });
    }

    fn poly_aftertouch(&mut self, channel: u8, pitch: u8, value: u8) {
        self.calls.push(EngineCall::PolyAftertouch {
            channel,
            pitch,
            value,
        });
    }

    fn sys_realtime(&mut self, port: u8, byte: u8) {
        self.calls.push(EngineCall::SysRealtime { port, byte });
    }
}

const MOCK_ATOM_CAPACITY: usize = 4096;

#[derive(Clone, Debug)]
enum MockPort {
    Audio(Option<Vec<f32>>),
    Control(Option<f32>),
    Atom(Option<Vec<u8>>),
}

/// Vec-backed port buffers for one plugin instance.
#[derive(Clone, Debug)]
pub struct MockHost {
    ports: Vec<MockPort>,
    kinds: Vec<PortKind>,
}

impl MockHost {
    /// Every port connected. Audio buffers hold `frames` zeros, control
    /// inputs their default, MIDI inputs an empty sequence and MIDI outputs
    /// a 4 KiB buffer.
    pub fn new(table: &PortTable, frames: usize) -> Self {
        let ports = table
            .ports()
            .iter()
            .map(|port| match port.kind {
                PortKind::AudioIn | PortKind::AudioOut => MockPort::Audio(Some(vec![0.0; frames])),
                PortKind::ControlIn | PortKind::ControlOut => {
                    MockPort::Control(Some(port.default_value()))
                }
                PortKind::MidiIn => MockPort::Atom(Some(empty_sequence(64))),
                PortKind::MidiOut => MockPort::Atom(Some(vec![0; MOCK_ATOM_CAPACITY])),
            })
            .collect();
        let mut host = Self {
            ports,
            kinds: table.ports().iter().map(|port| port.kind).collect(),
        };
        host.prepare_outputs();
        host
    }

    /// Resize every connected audio buffer to `frames` zeros.
    pub fn set_frames(&mut self, frames: usize) {
        for port in &mut self.ports {
            if let MockPort::Audio(Some(buf)) = port {
                buf.clear();
                buf.resize(frames, 0.0);
            }
        }
    }

    /// Re-declare MIDI output capacity, as a host does before each run.
    pub fn prepare_outputs(&mut self) {
        for (port, kind) in self.ports.iter_mut().zip(&self.kinds) {
            if let (MockPort::Atom(Some(buf)), PortKind::MidiOut) = (port, kind) {
                buf.fill(0);
                declare_capacity(buf);
            }
        }
    }

    pub fn disconnect(&mut self, port: usize) {
        if let Some(slot) = self.ports.get_mut(port) {
            *slot = match slot {
                MockPort::Audio(_) => MockPort::Audio(None),
                MockPort::Control(_) => MockPort::Control(None),
                MockPort::Atom(_) => MockPort::Atom(None),
            };
        }
    }

    pub fn audio(&self, port: usize) -> &[f32] {
        match self.ports.get(port) {
            Some(MockPort::Audio(Some(buf))) => buf,
            _ => &[],
        }
    }

    pub fn audio_mut(&mut self, port: usize) -> &mut [f32] {
        match self.ports.get_mut(port) {
            Some(MockPort::Audio(Some(buf))) => buf,
            _ => &mut [],
        }
    }

    pub fn set_control(&mut self, port: usize, value: f32) {
        if let Some(MockPort::Control(slot)) = self.ports.get_mut(port) {
            *slot = Some(value);
        }
    }

    pub fn control(&self, port: usize) -> Option<f32> {
        match self.ports.get(port) {
            Some(MockPort::Control(value)) => *value,
            _ => None,
        }
    }

    /// Replace a MIDI input's sequence with `events` (frame, bytes).
    pub fn set_midi_input(&mut self, port: usize, events: &[(i64, &[u8])]) {
        self.set_midi_input_typed(port, MOCK_URIDS.midi_event, events);
    }

    /// Like [`set_midi_input`](Self::set_midi_input) with a custom event type.
    pub fn set_midi_input_typed(&mut self, port: usize, type_urid: u32, events: &[(i64, &[u8])]) {
        let mut buf = vec![0u8; MOCK_ATOM_CAPACITY];
        declare_capacity(&mut buf);
        if let Some(mut writer) = SequenceWriter::begin(&mut buf, &MOCK_URIDS) {
            for (frames, data) in events {
                writer.append(&mut buf, *frames, type_urid, data);
            }
            let len = writer.finish(&mut buf);
            buf.truncate(len);
        }
        if let Some(slot) = self.ports.get_mut(port) {
            *slot = MockPort::Atom(Some(buf));
        }
    }

    /// Events (frame, bytes) of a MIDI output's sequence.
    pub fn midi_output(&self, port: usize) -> Vec<(i64, Vec<u8>)> {
        match self.ports.get(port) {
            Some(MockPort::Atom(Some(buf))) => SequenceReader::new(buf, &MOCK_URIDS)
                .map(|reader| {
                    reader
                        .filter(|event| event.type_urid == MOCK_URIDS.midi_event)
                        .map(|event| (event.frames, event.body.to_vec()))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Raw bytes of an atom port.
    pub fn atom(&self, port: usize) -> Option<&[u8]> {
        match self.ports.get(port) {
            Some(MockPort::Atom(Some(buf))) => Some(buf),
            _ => None,
        }
    }
}

fn empty_sequence(capacity: usize) -> Vec<u8> {
    let mut buf = vec![0u8; capacity];
    declare_capacity(&mut buf);
    if let Some(writer) = SequenceWriter::begin(&mut buf, &MOCK_URIDS) {
        writer.finish(&mut buf);
    }
    buf
}

impl HostPorts for MockHost {
    fn audio_input(&self, port: usize) -> Option<&[f32]> {
        match self.ports.get(port) {
            Some(MockPort::Audio(Some(buf))) => Some(buf),
            _ => None,
        }
    }

    fn audio_output(&mut self, port: usize) -> Option<&mut [f32]> {
        match self.ports.get_mut(port) {
            Some(MockPort::Audio(Some(buf))) => Some(buf),
            _ => None,
        }
    }

    fn control_input(&self, port: usize) -> Option<f32> {
        self.control(port)
    }

    fn set_control_output(&mut self, port: usize, value: f32) {
        if let Some(MockPort::Control(Some(slot))) = self.ports.get_mut(port) {
            *slot = value;
        }
    }

    fn atom_input(&self, port: usize) -> Option<&[u8]> {
        self.atom(port)
    }

    fn atom_output(&mut self, port: usize) -> Option<&mut [u8]> {
        match self.ports.get_mut(port) {
            Some(MockPort::Atom(Some(buf))) => Some(buf),
            _ => None,
        }
    }
}

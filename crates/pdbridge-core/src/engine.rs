//! The embedded engine surface the bridge drives.

use std::path::Path;
use std::sync::Arc;

use pdbridge_midi::MidiMessage;

use crate::guard::ActiveInstance;
use crate::Result;

/// Receives what the engine reports while an instance is in its critical
/// section.
pub trait EngineListener {
    /// A float arrived on a bound receiver.
    fn float_received(&mut self, name: &str, value: f32);

    /// The engine generated a MIDI message.
    fn midi_received(&mut self, message: MidiMessage);

    /// The bridge is about to run the block whose output starts at `frame`.
    fn block_started(&mut self, _frame: u32) {}
}

/// Listener for sections whose engine output is discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl EngineListener for NullListener {
    fn float_received(&mut self, _name: &str, _value: f32) {}

    fn midi_received(&mut self, _message: MidiMessage) {}
}

/// A process-global, non-reentrant signal-processing engine.
///
/// Every method is called with the engine's [`EngineContext`] lock held.
/// Output callbacks must be routed through the [`ActiveInstance`] returned
/// by [`hook_target`](Engine::hook_target); the engine never learns which
/// instance caused them.
///
/// [`EngineContext`]: crate::EngineContext
pub trait Engine: Send {
    /// An opened patch.
    type Patch: Send;
    /// A subscription created by [`bind`](Engine::bind).
    type Binding: Send;

    /// Cell the engine's output hooks read to find the current listener.
    fn hook_target(&self) -> Arc<ActiveInstance>;

    fn open_patch(&mut self, file: &str, dir: &Path) -> Result<Self::Patch>;

    fn close_patch(&mut self, patch: Self::Patch);

    /// Engine-assigned id of `patch`, unique among open patches.
    fn instantiation_id(&self, patch: &Self::Patch) -> i32;

    /// Make `patch`'s context current. Single-context engines ignore this.
    fn select(&mut self, _patch: &Self::Patch) {}

    /// Frames consumed and produced per [`process_raw`](Engine::process_raw).
    fn block_size(&self) -> usize;

    /// Run one block. Buffers are channel-major, `block_size()` frames per
    /// channel.
    fn process_raw(&mut self, input: &[f32], output: &mut [f32]);

    fn send_float(&mut self, receiver: &str, value: f32);

    fn send_message(&mut self, receiver: &str, selector: &str, args: &[f32]);

    /// Subscribe to floats sent to `receiver`.
    fn bind(&mut self, receiver: &str) -> Result<Self::Binding>;

    fn unbind(&mut self, binding: Self::Binding);

    /// Feed one raw byte to the engine's MIDI parser.
    fn midi_byte(&mut self, port: u8, byte: u8);

    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8);

    fn control_change(&mut self, channel: u8, control: u8, value: u8);

    fn program_change(&mut self, channel: u8, program: u8);

    /// `value` is centered on zero (-8192..=8191).
    fn pitch_bend(&mut self, channel: u8, value: i16);

    fn aftertouch(&mut self, channel: u8, value: u8);

    fn poly_aftertouch(&mut self, channel: u8, pitch: u8, value: u8);

    fn sys_realtime(&mut self, port: u8, byte: u8);
}

//! Staging of engine output during one processing callback.
//!
//! Engine hooks fire while the host's port buffers are being filled block by
//! block, so whatever the engine reports is parked here and written to the
//! host after the last block.

use pdbridge_midi::{MidiEvent, MidiMessage};
use smallvec::SmallVec;

/// Stack-first vector for MIDI events.
pub type MidiEventVec = SmallVec<[MidiEvent; 64]>;

#[derive(Debug)]
pub struct EngineOutputs {
    /// Latest value per control output slot this callback.
    controls: Vec<Option<f32>>,
    midi: MidiEventVec,
    midi_capacity: usize,
    frame: u32,
    dropped: usize,
}

impl EngineOutputs {
    pub fn new(control_outputs: usize, midi_capacity: usize) -> Self {
        let mut midi = MidiEventVec::new();
        midi.reserve(midi_capacity);
        Self {
            controls: vec![None; control_outputs],
            midi,
            midi_capacity,
            frame: 0,
            dropped: 0,
        }
    }

    /// Record a control output value. Later values in one callback win.
    #[inline]
    pub fn set_control(&mut self, slot: usize, value: f32) -> bool {
        match self.controls.get_mut(slot) {
            Some(pending) => {
                *pending = Some(value);
                true
            }
            None => false,
        }
    }

    /// Stage a MIDI message at the current block's frame. Returns `false`
    /// once the staging capacity is used up.
    #[inline]
    pub fn push_midi(&mut self, message: MidiMessage) -> bool {
        if self.midi.len() >= self.midi_capacity {
            self.dropped += 1;
            return false;
        }
        self.midi.push(MidiEvent::new(self.frame, 0, message));
        true
    }

    #[inline]
    pub fn set_frame(&mut self, frame: u32) {
        self.frame = frame;
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn controls(&self) -> &[Option<f32>] {
        &self.controls
    }

    pub fn midi_events(&self) -> &[MidiEvent] {
        &self.midi
    }

    /// MIDI messages refused this callback.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Forget everything staged. Keeps allocations.
    pub fn clear(&mut self) {
        self.controls.fill(None);
        self.midi.clear();
        self.frame = 0;
        self.dropped = 0;
    }
}

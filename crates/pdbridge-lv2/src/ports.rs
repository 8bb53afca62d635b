//! Host buffers connected through `connect_port`.

use std::ffi::c_void;
use std::sync::Arc;

use pdbridge_core::atom::ATOM_HEADER;
use pdbridge_core::{HostPorts, PortKind, PortTable};

/// Raw port pointers plus the current callback's frame count.
///
/// Pointers are only dereferenced inside `run`, where the host guarantees
/// they are valid for `frames` frames.
pub struct ConnectedPorts {
    table: Arc<PortTable>,
    pointers: Vec<*mut c_void>,
    /// Byte length of each atom output, read when the callback starts.
    atom_lengths: Vec<usize>,
    frames: usize,
}

impl ConnectedPorts {
    pub fn new(table: Arc<PortTable>) -> Self {
        let pointers = vec![std::ptr::null_mut(); table.len()];
        let atom_lengths = vec![0; table.len()];
        Self {
            table,
            pointers,
            atom_lengths,
            frames: 0,
        }
    }

    /// Record the buffer for `port`. Out-of-range indices are ignored.
    pub fn connect(&mut self, port: usize, data: *mut c_void) {
        if let Some(slot) = self.pointers.get_mut(port) {
            *slot = data;
        }
    }

    /// Start a callback of `frames` frames.
    ///
    /// Atom outputs are measured here, while their headers still hold the
    /// capacity the host declared; writing a sequence overwrites it.
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames;
        for port in 0..self.pointers.len() {
            self.atom_lengths[port] = match self.pointer(port, PortKind::MidiOut) {
                Some(pointer) => ATOM_HEADER + Self::atom_size(pointer),
                None => 0,
            };
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    fn pointer(&self, port: usize, kind: PortKind) -> Option<*mut c_void> {
        let pointer = *self.pointers.get(port)?;
        let matches = self.table.get(port).is_some_and(|p| p.kind == kind);
        (matches && !pointer.is_null()).then_some(pointer)
    }

    /// Atom header size field of a connected atom port.
    fn atom_size(pointer: *mut c_void) -> usize {
        // SAFETY: an atom port points at least at an atom header.
        unsafe { (pointer as *const u32).read_unaligned() as usize }
    }
}

impl HostPorts for ConnectedPorts {
    fn audio_input(&self, port: usize) -> Option<&[f32]> {
        let pointer = self.pointer(port, PortKind::AudioIn)?;
        // SAFETY: the host connected `frames` samples for this callback.
        Some(unsafe { std::slice::from_raw_parts(pointer as *const f32, self.frames) })
    }

    fn audio_output(&mut self, port: usize) -> Option<&mut [f32]> {
        let pointer = self.pointer(port, PortKind::AudioOut)?;
        // SAFETY: as above.
        Some(unsafe { std::slice::from_raw_parts_mut(pointer as *mut f32, self.frames) })
    }

    fn control_input(&self, port: usize) -> Option<f32> {
        let pointer = self.pointer(port, PortKind::ControlIn)?;
        // SAFETY: control ports point at one float.
        Some(unsafe { *(pointer as *const f32) })
    }

    fn set_control_output(&mut self, port: usize, value: f32) {
        if let Some(pointer) = self.pointer(port, PortKind::ControlOut) {
            // SAFETY: as above.
            unsafe { *(pointer as *mut f32) = value };
        }
    }

    fn atom_input(&self, port: usize) -> Option<&[u8]> {
        let pointer = self.pointer(port, PortKind::MidiIn)?;
        let len = ATOM_HEADER + Self::atom_size(pointer);
        // SAFETY: the host's sequence spans its header plus `size` bytes.
        Some(unsafe { std::slice::from_raw_parts(pointer as *const u8, len) })
    }

    fn atom_output(&mut self, port: usize) -> Option<&mut [u8]> {
        let pointer = self.pointer(port, PortKind::MidiOut)?;
        let len = *self.atom_lengths.get(port)?;
        if len == 0 {
            return None;
        }
        // SAFETY: the host owns the header plus the body capacity it declared
        // when the callback started.
        Some(unsafe { std::slice::from_raw_parts_mut(pointer as *mut u8, len) })
    }
}

//! C callbacks libpd invokes while processing.
//!
//! libpd never says which patch produced an output, so every hook forwards
//! to whichever instance currently holds the engine.

use std::ffi::{c_char, c_float, c_int, CStr};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use pdbridge_core::{ActiveInstance, EngineListener};
use pdbridge_midi::{MidiMessage, CHANNEL_MASK};
use tracing::{info, trace};

use crate::symbols::Symbols;

static HOOKS: OnceLock<Arc<ActiveInstance>> = OnceLock::new();

static PRINT: Mutex<PrintBuffer> = parking_lot::const_mutex(PrintBuffer::new());

/// Joins the fragments Pd prints one atom at a time into whole lines.
#[derive(Debug, Default)]
struct PrintBuffer {
    line: String,
}

impl PrintBuffer {
    const fn new() -> Self {
        Self { line: String::new() }
    }

    /// Append `fragment` and hand every completed, non-blank line to `emit`.
    fn push(&mut self, fragment: &str, mut emit: impl FnMut(&str)) {
        self.line.push_str(fragment);
        while let Some(end) = self.line.find('\n') {
            let text = self.line[..end].trim_end();
            if !text.is_empty() {
                emit(text);
            }
            self.line.drain(..=end);
        }
    }
}

/// The cell every hook in this module reads.
pub fn target() -> Arc<ActiveInstance> {
    HOOKS.get_or_init(|| Arc::new(ActiveInstance::new())).clone()
}

fn deliver(f: impl FnOnce(&mut dyn EngineListener)) {
    let hooks = HOOKS.get_or_init(|| Arc::new(ActiveInstance::new()));
    // SAFETY: libpd only calls hooks from inside `libpd_process_raw` and the
    // other entry points, all of which run with the engine lock held by the
    // instance published in `hooks`.
    if !unsafe { hooks.dispatch(f) } {
        trace!("engine output outside any instance section, dropped");
    }
}

/// libpd numbers channels `16 * port + channel`; only the masked low bits
/// survive, so channels 8..=15 fold onto 0..=7.
#[inline]
fn channel(raw: c_int) -> u8 {
    (raw & c_int::from(CHANNEL_MASK)) as u8
}

#[inline]
fn data(raw: c_int) -> u8 {
    (raw & 0x7F) as u8
}

pub(crate) unsafe extern "C" fn print_hook(text: *const c_char) {
    if text.is_null() {
        return;
    }
    // SAFETY: libpd passes a NUL-terminated string valid for the call.
    let text = unsafe { CStr::from_ptr(text) }.to_string_lossy();
    PRINT
        .lock()
        .push(&text, |line| info!(target: "pdbridge::pd", "{line}"));
}

pub(crate) unsafe extern "C" fn float_hook(receiver: *const c_char, value: c_float) {
    if receiver.is_null() {
        return;
    }
    // SAFETY: as for `print_hook`.
    let receiver = unsafe { CStr::from_ptr(receiver) };
    match receiver.to_str() {
        Ok(name) => deliver(|listener| listener.float_received(name, value)),
        Err(_) => trace!("float on a receiver with a non UTF-8 name"),
    }
}

pub(crate) unsafe extern "C" fn note_on_hook(ch: c_int, pitch: c_int, velocity: c_int) {
    deliver(|listener| {
        listener.midi_received(MidiMessage::NoteOn {
            channel: channel(ch),
            note: data(pitch),
            velocity: data(velocity),
        })
    });
}

pub(crate) unsafe extern "C" fn control_change_hook(ch: c_int, control: c_int, value: c_int) {
    deliver(|listener| {
        listener.midi_received(MidiMessage::ControlChange {
            channel: channel(ch),
            control: data(control),
            value: data(value),
        })
    });
}

pub(crate) unsafe extern "C" fn program_change_hook(ch: c_int, program: c_int) {
    deliver(|listener| {
        listener.midi_received(MidiMessage::ProgramChange {
            channel: channel(ch),
            program: data(program),
        })
    });
}

pub(crate) unsafe extern "C" fn pitch_bend_hook(ch: c_int, value: c_int) {
    let value = value.clamp(-8192, 8191) as i16;
    deliver(|listener| {
        listener.midi_received(MidiMessage::PitchBend {
            channel: channel(ch),
            value,
        })
    });
}

pub(crate) unsafe extern "C" fn aftertouch_hook(ch: c_int, value: c_int) {
    deliver(|listener| {
        listener.midi_received(MidiMessage::ChannelPressure {
            channel: channel(ch),
            pressure: data(value),
        })
    });
}

pub(crate) unsafe extern "C" fn poly_aftertouch_hook(ch: c_int, pitch: c_int, value: c_int) {
    deliver(|listener| {
        listener.midi_received(MidiMessage::PolyPressure {
            channel: channel(ch),
            note: data(pitch),
            pressure: data(value),
        })
    });
}

/// Point libpd's output hooks at this module. Must run once per libpd
/// context, with that context current.
pub(crate) fn install(symbols: &Symbols) {
    // SAFETY: the hooks match libpd's prototypes and live for the process.
    unsafe {
        (symbols.set_printhook)(Some(print_hook));
        (symbols.set_floathook)(Some(float_hook));
        (symbols.set_noteonhook)(Some(note_on_hook));
        (symbols.set_controlchangehook)(Some(control_change_hook));
        (symbols.set_programchangehook)(Some(program_change_hook));
        (symbols.set_pitchbendhook)(Some(pitch_bend_hook));
        (symbols.set_aftertouchhook)(Some(aftertouch_hook));
        (symbols.set_polyaftertouchhook)(Some(poly_aftertouch_hook));
    }
}

//! libpd entry points resolved from the bundle's shared library.

use std::ffi::{c_char, c_float, c_int, c_void};
use std::path::Path;

use libloading::Library;
use pdbridge_core::{BridgeError, LoadStage, Result};

pub(crate) type PrintHook = unsafe extern "C" fn(*const c_char);
pub(crate) type FloatHook = unsafe extern "C" fn(*const c_char, c_float);
pub(crate) type IntHook2 = unsafe extern "C" fn(c_int, c_int);
pub(crate) type IntHook3 = unsafe extern "C" fn(c_int, c_int, c_int);

type Int2 = unsafe extern "C" fn(c_int, c_int) -> c_int;
type Int3 = unsafe extern "C" fn(c_int, c_int, c_int) -> c_int;

/// Per-context entry points, present when libpd was built with
/// multi-instance support.
pub(crate) struct InstanceSymbols {
    pub new_instance: unsafe extern "C" fn() -> *mut c_void,
    pub this_instance: unsafe extern "C" fn() -> *mut c_void,
    pub set_instance: unsafe extern "C" fn(*mut c_void),
    pub free_instance: unsafe extern "C" fn(*mut c_void),
}

pub(crate) struct Symbols {
    pub init: unsafe extern "C" fn() -> c_int,
    pub init_audio: unsafe extern "C" fn(c_int, c_int, c_int) -> c_int,
    pub openfile: unsafe extern "C" fn(*const c_char, *const c_char) -> *mut c_void,
    pub closefile: unsafe extern "C" fn(*mut c_void),
    pub getdollarzero: unsafe extern "C" fn(*mut c_void) -> c_int,
    pub blocksize: unsafe extern "C" fn() -> c_int,
    pub process_raw: unsafe extern "C" fn(*const c_float, *mut c_float) -> c_int,
    pub float: unsafe extern "C" fn(*const c_char, c_float) -> c_int,
    pub bind: unsafe extern "C" fn(*const c_char) -> *mut c_void,
    pub unbind: unsafe extern "C" fn(*mut c_void),
    pub start_message: unsafe extern "C" fn(c_int) -> c_int,
    pub add_float: unsafe extern "C" fn(c_float),
    pub finish_message: unsafe extern "C" fn(*const c_char, *const c_char) -> c_int,
    pub noteon: Int3,
    pub controlchange: Int3,
    pub programchange: Int2,
    pub pitchbend: Int2,
    pub aftertouch: Int2,
    pub polyaftertouch: Int3,
    pub midibyte: Int2,
    pub sysrealtime: Int2,
    pub set_printhook: unsafe extern "C" fn(Option<PrintHook>),
    pub set_floathook: unsafe extern "C" fn(Option<FloatHook>),
    pub set_noteonhook: unsafe extern "C" fn(Option<IntHook3>),
    pub set_controlchangehook: unsafe extern "C" fn(Option<IntHook3>),
    pub set_programchangehook: unsafe extern "C" fn(Option<IntHook2>),
    pub set_pitchbendhook: unsafe extern "C" fn(Option<IntHook2>),
    pub set_aftertouchhook: unsafe extern "C" fn(Option<IntHook2>),
    pub set_polyaftertouchhook: unsafe extern "C" fn(Option<IntHook3>),
    pub instances: Option<InstanceSymbols>,
    // Keeps every pointer above valid.
    _library: Library,
}

fn required<T: Copy>(library: &Library, path: &Path, name: &str) -> Result<T> {
    // SAFETY: every caller asks for the type of the C prototype of `name`.
    unsafe {
        library
            .get::<T>(name.as_bytes())
            .map(|symbol| *symbol)
            .map_err(|e| BridgeError::load_failed(path, LoadStage::Symbols, format!("No {name} symbol: {e}")))
    }
}

fn optional<T: Copy>(library: &Library, name: &str) -> Option<T> {
    // SAFETY: as for `required`.
    unsafe { library.get::<T>(name.as_bytes()).ok().map(|symbol| *symbol) }
}

impl Symbols {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading libpd runs no initialisers with preconditions.
        let library = unsafe {
            Library::new(path).map_err(|e| {
                BridgeError::load_failed(path, LoadStage::Library, format!("Failed to load library: {e}"))
            })?
        };

        let instances = match (
            optional(&library, "libpd_new_instance"),
            optional(&library, "libpd_this_instance"),
            optional(&library, "libpd_set_instance"),
            optional(&library, "libpd_free_instance"),
        ) {
            (Some(new_instance), Some(this_instance), Some(set_instance), Some(free_instance)) => Some(InstanceSymbols {
                new_instance,
                this_instance,
                set_instance,
                free_instance,
            }),
            _ => None,
        };

        Ok(Self {
            init: required(&library, path, "libpd_init")?,
            init_audio: required(&library, path, "libpd_init_audio")?,
            openfile: required(&library, path, "libpd_openfile")?,
            closefile: required(&library, path, "libpd_closefile")?,
            getdollarzero: required(&library, path, "libpd_getdollarzero")?,
            blocksize: required(&library, path, "libpd_blocksize")?,
            process_raw: required(&library, path, "libpd_process_raw")?,
            float: required(&library, path, "libpd_float")?,
            bind: required(&library, path, "libpd_bind")?,
            unbind: required(&library, path, "libpd_unbind")?,
            start_message: required(&library, path, "libpd_start_message")?,
            add_float: required(&library, path, "libpd_add_float")?,
            finish_message: required(&library, path, "libpd_finish_message")?,
            noteon: required(&library, path, "libpd_noteon")?,
            controlchange: required(&library, path, "libpd_controlchange")?,
            programchange: required(&library, path, "libpd_programchange")?,
            pitchbend: required(&library, path, "libpd_pitchbend")?,
            aftertouch: required(&library, path, "libpd_aftertouch")?,
            polyaftertouch: required(&library, path, "libpd_polyaftertouch")?,
            midibyte: required(&library, path, "libpd_midibyte")?,
            sysrealtime: required(&library, path, "libpd_sysrealtime")?,
            set_printhook: required(&library, path, "libpd_set_printhook")?,
            set_floathook: required(&library, path, "libpd_set_floathook")?,
            set_noteonhook: required(&library, path, "libpd_set_noteonhook")?,
            set_controlchangehook: required(&library, path, "libpd_set_controlchangehook")?,
            set_programchangehook: required(&library, path, "libpd_set_programchangehook")?,
            set_pitchbendhook: required(&library, path, "libpd_set_pitchbendhook")?,
            set_aftertouchhook: required(&library, path, "libpd_set_aftertouchhook")?,
            set_polyaftertouchhook: required(&library, path, "libpd_set_polyaftertouchhook")?,
            instances,
            _library: library,
        })
    }
}

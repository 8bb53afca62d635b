//! libpd as an [`Engine`], plus the process-wide registry that loads and
//! initialises it once.

use std::collections::HashMap;
use std::ffi::{c_float, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;
use pdbridge_core::{ActiveInstance, BridgeConfig, BridgeError, Engine, EngineContext, LoadStage, Result};
use tracing::{debug, info, trace, warn};

use crate::hooks;
use crate::symbols::Symbols;

/// A separate libpd context owned by one patch.
#[derive(Debug)]
struct PdInstance(NonNull<c_void>);

/// A patch opened by [`LibPd`].
#[derive(Debug)]
pub struct LibPdPatch {
    handle: NonNull<c_void>,
    dollar_zero: i32,
    instance: Option<PdInstance>,
}

// SAFETY: the handles are only dereferenced by libpd, and only with the
// engine lock held.
unsafe impl Send for LibPdPatch {}

impl LibPdPatch {
    /// The patch's `$0`.
    pub fn dollar_zero(&self) -> i32 {
        self.dollar_zero
    }
}

/// A receiver subscription created by [`LibPd::bind`](Engine::bind).
#[derive(Debug)]
pub struct LibPdBinding {
    handle: NonNull<c_void>,
    receiver: String,
}

// SAFETY: as for `LibPdPatch`.
unsafe impl Send for LibPdBinding {}

impl LibPdBinding {
    pub fn receiver(&self) -> &str {
        &self.receiver
    }
}

/// The libpd engine. Constructed only through [`shared_context`].
pub struct LibPd {
    symbols: &'static Symbols,
    hooks: Arc<ActiveInstance>,
    sample_rate: f64,
    inputs: usize,
    outputs: usize,
    /// The context libpd started with, restored after a patch context is freed.
    main_instance: Option<NonNull<c_void>>,
    /// Receiver names already converted for libpd.
    names: HashMap<String, CString>,
}

// SAFETY: `main_instance` is an opaque handle passed back to libpd only.
unsafe impl Send for LibPd {}

impl std::fmt::Debug for LibPd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibPd")
            .field("sample_rate", &self.sample_rate)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("multi_instance", &self.symbols.instances.is_some())
            .finish_non_exhaustive()
    }
}

fn c_string(text: &str, path: &Path, stage: LoadStage) -> Result<CString> {
    CString::new(text).map_err(|_| BridgeError::load_failed(path, stage, format!("{text:?} contains a NUL byte")))
}

impl LibPd {
    /// Initialise the library's main context.
    fn start(symbols: &'static Symbols, path: &Path, sample_rate: f64, inputs: usize, outputs: usize) -> Result<Self> {
        let hooks = hooks::target();
        // SAFETY: first and only initialisation of this library in the process.
        let main_instance = unsafe {
            (symbols.set_printhook)(Some(hooks::print_hook));
            if (symbols.init)() != 0 {
                debug!("libpd_init reports it was already initialised");
            }
            symbols
                .instances
                .as_ref()
                .and_then(|instances| NonNull::new((instances.this_instance)()))
        };

        let engine = Self {
            symbols,
            hooks,
            sample_rate,
            inputs,
            outputs,
            main_instance,
            names: HashMap::new(),
        };
        engine.init_current(path)?;
        Ok(engine)
    }

    /// Install hooks and open audio on the current libpd context.
    fn init_current(&self, path: &Path) -> Result<()> {
        hooks::install(self.symbols);
        // SAFETY: plain libpd call on the current context.
        let status = unsafe {
            (self.symbols.init_audio)(self.inputs as c_int, self.outputs as c_int, self.sample_rate as c_int)
        };
        if status != 0 {
            return Err(BridgeError::load_failed(
                path,
                LoadStage::Initialization,
                format!("libpd_init_audio failed with status {status}"),
            ));
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn is_multi_instance(&self) -> bool {
        self.symbols.instances.is_some()
    }

    fn name(&mut self, name: &str) -> Option<&CStr> {
        if !self.names.contains_key(name) {
            let Ok(converted) = CString::new(name) else {
                trace!(name, "receiver name contains a NUL byte");
                return None;
            };
            self.names.insert(name.to_string(), converted);
        }
        self.names.get(name).map(CString::as_c_str)
    }

    fn restore_main(&self) {
        if let (Some(instances), Some(main)) = (&self.symbols.instances, self.main_instance) {
            // SAFETY: the main context lives for the process.
            unsafe { (instances.set_instance)(main.as_ptr()) };
        }
    }
}

impl Engine for LibPd {
    type Patch = LibPdPatch;
    type Binding = LibPdBinding;

    fn hook_target(&self) -> Arc<ActiveInstance> {
        self.hooks.clone()
    }

    fn open_patch(&mut self, file: &str, dir: &Path) -> Result<LibPdPatch> {
        let path = dir.join(file);
        let c_file = c_string(file, &path, LoadStage::Patch)?;
        let c_dir = c_string(&dir.to_string_lossy(), &path, LoadStage::Patch)?;

        let instance = match &self.symbols.instances {
            Some(instances) => {
                // SAFETY: plain libpd calls; the new context becomes current.
                let created = unsafe { NonNull::new((instances.new_instance)()) };
                match created {
                    Some(handle) => {
                        unsafe { (instances.set_instance)(handle.as_ptr()) };
                        if let Err(e) = self.init_current(&path) {
                            unsafe { (instances.free_instance)(handle.as_ptr()) };
                            self.restore_main();
                            return Err(e);
                        }
                        Some(PdInstance(handle))
                    }
                    None => {
                        warn!("libpd_new_instance returned null, sharing the main context");
                        self.restore_main();
                        None
                    }
                }
            }
            None => None,
        };

        // SAFETY: both strings are NUL-terminated and outlive the call.
        let handle = unsafe { (self.symbols.openfile)(c_file.as_ptr(), c_dir.as_ptr()) };
        let Some(handle) = NonNull::new(handle) else {
            if let (Some(instances), Some(PdInstance(context))) = (&self.symbols.instances, &instance) {
                unsafe { (instances.free_instance)(context.as_ptr()) };
                self.restore_main();
            }
            return Err(BridgeError::load_failed(path, LoadStage::Patch, "libpd could not open the patch"));
        };

        // SAFETY: `handle` was just returned by libpd_openfile.
        let dollar_zero = unsafe { (self.symbols.getdollarzero)(handle.as_ptr()) };
        debug!(file, dollar_zero, "patch opened");
        Ok(LibPdPatch {
            handle,
            dollar_zero,
            instance,
        })
    }

    fn close_patch(&mut self, patch: LibPdPatch) {
        // SAFETY: `patch` came from `open_patch` and is closed exactly once.
        unsafe {
            if let (Some(instances), Some(PdInstance(context))) = (&self.symbols.instances, &patch.instance) {
                (instances.set_instance)(context.as_ptr());
            }
            (self.symbols.closefile)(patch.handle.as_ptr());
            if let (Some(instances), Some(PdInstance(context))) = (&self.symbols.instances, &patch.instance) {
                (instances.free_instance)(context.as_ptr());
                self.restore_main();
            }
        }
        debug!(dollar_zero = patch.dollar_zero, "patch closed");
    }

    fn instantiation_id(&self, patch: &LibPdPatch) -> i32 {
        patch.dollar_zero
    }

    fn select(&mut self, patch: &LibPdPatch) {
        if let (Some(instances), Some(PdInstance(context))) = (&self.symbols.instances, &patch.instance) {
            // SAFETY: the context stays alive until `close_patch`.
            unsafe { (instances.set_instance)(context.as_ptr()) };
        }
    }

    fn block_size(&self) -> usize {
        // SAFETY: plain libpd call.
        let size = unsafe { (self.symbols.blocksize)() };
        usize::try_from(size).unwrap_or(0)
    }

    fn process_raw(&mut self, input: &[f32], output: &mut [f32]) {
        let block = self.block_size();
        if input.len() < block * self.inputs || output.len() < block * self.outputs {
            warn!(
                input = input.len(),
                output = output.len(),
                block,
                "transfer buffers smaller than one engine block, skipped"
            );
            return;
        }
        // SAFETY: both buffers hold at least one block per channel.
        unsafe { (self.symbols.process_raw)(input.as_ptr(), output.as_mut_ptr()) };
    }

    fn send_float(&mut self, receiver: &str, value: f32) {
        let float = self.symbols.float;
        if let Some(name) = self.name(receiver) {
            // SAFETY: `name` is NUL-terminated and outlives the call.
            unsafe { float(name.as_ptr(), value as c_float) };
        }
    }

    fn send_message(&mut self, receiver: &str, selector: &str, args: &[f32]) {
        let (Ok(receiver), Ok(selector)) = (CString::new(receiver), CString::new(selector)) else {
            trace!(receiver, selector, "message names contain a NUL byte");
            return;
        };
        // SAFETY: libpd's message builder, used start to finish on one thread.
        unsafe {
            (self.symbols.start_message)(args.len() as c_int);
            for &arg in args {
                (self.symbols.add_float)(arg as c_float);
            }
            (self.symbols.finish_message)(receiver.as_ptr(), selector.as_ptr());
        }
    }

    fn bind(&mut self, receiver: &str) -> Result<LibPdBinding> {
        let c_receiver = c_string(receiver, Path::new(receiver), LoadStage::Binding)?;
        // SAFETY: `c_receiver` is NUL-terminated; libpd copies the symbol.
        let handle = unsafe { (self.symbols.bind)(c_receiver.as_ptr()) };
        match NonNull::new(handle) {
            Some(handle) => Ok(LibPdBinding {
                handle,
                receiver: receiver.to_string(),
            }),
            None => Err(BridgeError::load_failed(
                receiver,
                LoadStage::Binding,
                "libpd_bind returned null",
            )),
        }
    }

    fn unbind(&mut self, binding: LibPdBinding) {
        // SAFETY: `binding` came from `bind` and is released exactly once.
        unsafe { (self.symbols.unbind)(binding.handle.as_ptr()) };
    }

    fn midi_byte(&mut self, port: u8, byte: u8) {
        unsafe { (self.symbols.midibyte)(port as c_int, byte as c_int) };
    }

    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        unsafe { (self.symbols.noteon)(channel as c_int, pitch as c_int, velocity as c_int) };
    }

    fn control_change(&mut self, channel: u8, control: u8, value: u8) {
        unsafe { (self.symbols.controlchange)(channel as c_int, control as c_int, value as c_int) };
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        unsafe { (self.symbols.programchange)(channel as c_int, program as c_int) };
    }

    fn pitch_bend(&mut self, channel: u8, value: i16) {
        unsafe { (self.symbols.pitchbend)(channel as c_int, value as c_int) };
    }

    fn aftertouch(&mut self, channel: u8, value: u8) {
        unsafe { (self.symbols.aftertouch)(channel as c_int, value as c_int) };
    }

    fn poly_aftertouch(&mut self, channel: u8, pitch: u8, value: u8) {
        unsafe { (self.symbols.polyaftertouch)(channel as c_int, pitch as c_int, value as c_int) };
    }

    fn sys_realtime(&mut self, port: u8, byte: u8) {
        unsafe { (self.symbols.sysrealtime)(port as c_int, byte as c_int) };
    }
}

struct Loaded {
    path: PathBuf,
    sample_rate: f64,
    inputs: usize,
    outputs: usize,
    context: Arc<EngineContext<LibPd>>,
}

static REGISTRY: Mutex<Option<Loaded>> = parking_lot::const_mutex(None);

/// Where the engine library for `config` lives inside `bundle_dir`.
///
/// An absolute `engine_library` is used as is.
pub fn library_path(bundle_dir: &Path, config: &BridgeConfig) -> PathBuf {
    bundle_dir.join(&config.engine_library)
}

/// The process's engine context, loading and initialising libpd on first use.
///
/// Later callers share the first caller's context. A different sample rate
/// is accepted with a warning; a different channel layout is refused since
/// the engine's transfer buffers are sized by it.
pub fn shared_context(
    bundle_dir: &Path,
    config: &BridgeConfig,
    sample_rate: f64,
    inputs: usize,
    outputs: usize,
) -> Result<Arc<EngineContext<LibPd>>> {
    let mut registry = REGISTRY.lock();
    if let Some(loaded) = registry.as_ref() {
        if (loaded.inputs, loaded.outputs) != (inputs, outputs) {
            return Err(BridgeError::InvalidConfig(format!(
                "engine already running with {} inputs and {} outputs, requested {inputs} and {outputs}",
                loaded.inputs, loaded.outputs
            )));
        }
        if loaded.sample_rate != sample_rate {
            warn!(
                initialised = loaded.sample_rate,
                requested = sample_rate,
                "engine already running at another sample rate, keeping it"
            );
        }
        debug!(path = %loaded.path.display(), "reusing loaded engine");
        return Ok(loaded.context.clone());
    }

    let path = library_path(bundle_dir, config);
    let symbols: &'static Symbols = Box::leak(Box::new(Symbols::load(&path)?));
    let engine = LibPd::start(symbols, &path, sample_rate, inputs, outputs)?;
    info!(
        path = %path.display(),
        sample_rate,
        inputs,
        outputs,
        multi_instance = engine.is_multi_instance(),
        "engine loaded"
    );

    let context = Arc::new(EngineContext::new(engine));
    *registry = Some(Loaded {
        path,
        sample_rate,
        inputs,
        outputs,
        context: context.clone(),
    });
    Ok(context)
}

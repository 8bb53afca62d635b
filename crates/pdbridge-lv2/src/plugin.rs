//! The LV2 descriptor and its callbacks.

use std::ffi::{c_char, c_void, CStr};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use lv2_raw::{LV2Descriptor, LV2Feature, LV2Handle};
use pdbridge_core::{BridgeConfig, BridgeError, Engine, Instance, PortKind, PortSpec, PortTable, Result};
use pdbridge_libpd::{shared_context, LibPd};
use tracing::{debug, error};

use crate::logging;
use crate::ports::ConnectedPorts;
use crate::urid::map_urids;

/// An [`LV2Descriptor`] that can live in a `static`.
#[repr(transparent)]
pub struct Descriptor(LV2Descriptor);

// SAFETY: the only pointer is the 'static URI string.
unsafe impl Sync for Descriptor {}

impl Descriptor {
    pub const fn of<P: PluginDefinition>() -> Self {
        Self(LV2Descriptor {
            uri: P::URI.as_ptr(),
            instantiate: instantiate::<P>,
            connect_port,
            activate: Some(activate),
            run,
            deactivate: Some(deactivate),
            cleanup,
            extension_data,
        })
    }

    pub fn as_raw(&self) -> *const LV2Descriptor {
        &self.0
    }
}

/// One exported plugin: its URI, ports and bridge configuration.
///
/// Implemented by [`export_lv2_plugin!`](crate::export_lv2_plugin).
pub trait PluginDefinition: 'static {
    const URI: &'static CStr;

    /// The validated port table, or `None` if validation failed.
    fn port_table() -> Option<&'static Arc<PortTable>>;

    fn config() -> BridgeConfig {
        BridgeConfig::default()
    }
}

/// Build and validate a plugin's port table.
pub fn build_port_table(uri: &str, specs: &[PortSpec]) -> Option<Arc<PortTable>> {
    let table = PortTable::new(specs);
    match table.validate() {
        Ok(()) => Some(Arc::new(table)),
        Err(e) => {
            error!(uri, "Rejected port table: {e}");
            None
        }
    }
}

/// A live plugin instance: the bridge instance and its host buffers.
pub struct Plugin<E: Engine> {
    instance: Instance<E>,
    ports: ConnectedPorts,
}

impl<E: Engine> Plugin<E> {
    pub fn new(instance: Instance<E>, table: Arc<PortTable>) -> Self {
        Self {
            instance,
            ports: ConnectedPorts::new(table),
        }
    }

    pub fn connect_port(&mut self, port: usize, data: *mut c_void) {
        self.ports.connect(port, data);
    }

    pub fn activate(&mut self) {
        self.instance.activate();
    }

    pub fn deactivate(&mut self) {
        self.instance.deactivate();
    }

    /// Process `frames` frames from the connected buffers.
    ///
    /// # Safety
    ///
    /// Every connected pointer must be valid for this callback: audio ports
    /// for `frames` samples, atom ports for the size in their header.
    pub unsafe fn run(&mut self, frames: usize) {
        self.ports.set_frames(frames);
        self.instance.process(&mut self.ports, frames);
    }

    pub fn instance(&self) -> &Instance<E> {
        &self.instance
    }
}

unsafe fn create<P: PluginDefinition>(
    sample_rate: f64,
    bundle_path: *const c_char,
    features: *const *const LV2Feature,
) -> Result<Plugin<LibPd>> {
    let table = P::port_table()
        .ok_or_else(|| BridgeError::InvalidPortTable("port table failed validation".to_string()))?
        .clone();
    let urids = map_urids(features)?;
    if bundle_path.is_null() {
        return Err(BridgeError::InvalidConfig("host passed no bundle path".to_string()));
    }
    let bundle = PathBuf::from(CStr::from_ptr(bundle_path).to_string_lossy().into_owned());

    let config = P::config();
    let context = shared_context(
        &bundle,
        &config,
        sample_rate,
        table.count(PortKind::AudioIn),
        table.count(PortKind::AudioOut),
    )?;
    let instance = Instance::open(context, table.clone(), &bundle, urids, &config)?;
    Ok(Plugin::new(instance, table))
}

extern "C" fn instantiate<P: PluginDefinition>(
    _descriptor: *const LV2Descriptor,
    sample_rate: f64,
    bundle_path: *const c_char,
    features: *const *const LV2Feature,
) -> LV2Handle {
    logging::init();
    // SAFETY: the host passes a NUL-terminated bundle path and a
    // null-terminated feature array.
    match unsafe { create::<P>(sample_rate, bundle_path, features) } {
        Ok(plugin) => {
            debug!(uri = %P::URI.to_string_lossy(), sample_rate, "Instantiated");
            Box::into_raw(Box::new(plugin)).cast()
        }
        Err(e) => {
            error!(uri = %P::URI.to_string_lossy(), "Failed to instantiate: {e}");
            ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `instance` must be null or a handle returned by `instantiate` and not
/// yet cleaned up.
unsafe fn plugin<'a>(instance: LV2Handle) -> Option<&'a mut Plugin<LibPd>> {
    (instance as *mut Plugin<LibPd>).as_mut()
}

// SAFETY (all callbacks below): hosts only pass handles from `instantiate`,
// and never call into one instance from two threads at once.

extern "C" fn connect_port(instance: LV2Handle, port: u32, data: *mut c_void) {
    if let Some(plugin) = unsafe { plugin(instance) } {
        plugin.connect_port(port as usize, data);
    }
}

extern "C" fn activate(instance: LV2Handle) {
    if let Some(plugin) = unsafe { plugin(instance) } {
        plugin.activate();
    }
}

extern "C" fn run(instance: LV2Handle, sample_count: u32) {
    if let Some(plugin) = unsafe { plugin(instance) } {
        unsafe { plugin.run(sample_count as usize) };
    }
}

extern "C" fn deactivate(instance: LV2Handle) {
    if let Some(plugin) = unsafe { plugin(instance) } {
        plugin.deactivate();
    }
}

extern "C" fn cleanup(instance: LV2Handle) {
    if !instance.is_null() {
        drop(unsafe { Box::from_raw(instance as *mut Plugin<LibPd>) });
    }
}

extern "C" fn extension_data(_uri: *const u8) -> *const c_void {
    ptr::null()
}

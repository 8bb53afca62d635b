//! One bridged plugin instance.
//!
//! Every engine interaction of an instance happens inside one
//! [`EngineContext::with_instance`] section: opening the patch and binding
//! its control outputs, enabling DSP on activation, each processing callback
//! and teardown.

use std::path::Path;
use std::sync::Arc;

use pdbridge_midi::MidiMessage;
use tracing::{debug, error, info};

use crate::atom::Urids;
use crate::config::BridgeConfig;
use crate::control::ControlValuePump;
use crate::engine::{Engine, EngineListener, NullListener};
use crate::error::{BridgeError, LoadStage, Result};
use crate::guard::{EngineContext, InstanceToken};
use crate::host::HostPorts;
use crate::midi_bridge::{MidiEgress, MidiIngress};
use crate::namespace::NamespaceRouter;
use crate::outputs::EngineOutputs;
use crate::port::{PortKind, PortTable};
use crate::reframe::BlockReframer;

pub struct Instance<E: Engine> {
    context: Arc<EngineContext<E>>,
    table: Arc<PortTable>,
    token: InstanceToken,
    patch: Option<E::Patch>,
    bindings: Vec<E::Binding>,
    router: NamespaceRouter,
    controls: ControlValuePump,
    reframer: BlockReframer,
    ingress: MidiIngress,
    egress: MidiEgress,
    outputs: EngineOutputs,
    urids: Urids,
    activated: bool,
}

/// Listener routing engine output into an instance's staging area.
struct Dispatch<'a> {
    controls: &'a ControlValuePump,
    outputs: &'a mut EngineOutputs,
}

impl Dispatch<'_> {
    /// Keep `value` if `name` is one of this instance's routed control
    /// outputs. The engine bus is shared, so anything else is ignored.
    fn process_float(&mut self, name: &str, value: f32) {
        if let Some(slot) = self.controls.output_slot(name) {
            self.outputs.set_control(slot, value);
        }
    }
}

impl EngineListener for Dispatch<'_> {
    fn float_received(&mut self, name: &str, value: f32) {
        self.process_float(name, value);
    }

    fn midi_received(&mut self, message: MidiMessage) {
        self.outputs.push_midi(message);
    }

    fn block_started(&mut self, frame: u32) {
        self.outputs.set_frame(frame);
    }
}

struct Opened<E: Engine> {
    patch: E::Patch,
    bindings: Vec<E::Binding>,
    router: NamespaceRouter,
    controls: ControlValuePump,
    block_size: usize,
}

impl<E: Engine> Instance<E> {
    /// Open `config.patch_file` from `bundle_dir` and bind the control
    /// outputs. Any failure leaves the engine as it was.
    pub fn open(
        context: Arc<EngineContext<E>>,
        table: Arc<PortTable>,
        bundle_dir: &Path,
        urids: Urids,
        config: &BridgeConfig,
    ) -> Result<Self> {
        config.validate()?;
        table.validate()?;

        let token = InstanceToken::next();
        let opened = context.with_instance(
            token,
            None,
            &mut NullListener,
            |session| -> Result<Opened<E>> {
                let patch = session.open_patch(&config.patch_file, bundle_dir)?;
                session.select(&patch);

                let block_size = session.block_size();
                if block_size == 0 {
                    session.close_patch(patch);
                    return Err(BridgeError::load_failed(
                        bundle_dir.join(&config.patch_file),
                        LoadStage::Initialization,
                        "engine reports a block size of zero",
                    ));
                }

                let router = NamespaceRouter::new(session.instantiation_id(&patch));
                let controls = ControlValuePump::new(&table, &router);
                let mut bindings = Vec::with_capacity(controls.outputs().len());
                for control in controls.outputs() {
                    match session.bind(&control.routed) {
                        Ok(binding) => bindings.push(binding),
                        Err(err) => {
                            for binding in bindings {
                                session.unbind(binding);
                            }
                            session.close_patch(patch);
                            return Err(err);
                        }
                    }
                }
                Ok(Opened {
                    patch,
                    bindings,
                    router,
                    controls,
                    block_size,
                })
            },
        );

        let opened = match opened {
            Ok(opened) => opened,
            Err(err) => {
                error!(%err, "Failed to open instance");
                return Err(err);
            }
        };

        info!(
            instantiation_id = opened.router.instantiation_id(),
            block_size = opened.block_size,
            patch = %config.patch_file,
            "Opened patch"
        );

        Ok(Self {
            reframer: BlockReframer::new(
                opened.block_size,
                table.count(PortKind::AudioIn),
                table.count(PortKind::AudioOut),
                config.remainder,
            ),
            ingress: MidiIngress::new(),
            egress: MidiEgress::new(table.count(PortKind::MidiOut)),
            outputs: EngineOutputs::new(opened.controls.outputs().len(), config.midi_output_capacity),
            patch: Some(opened.patch),
            bindings: opened.bindings,
            router: opened.router,
            controls: opened.controls,
            context,
            table,
            token,
            urids,
            activated: false,
        })
    }

    /// Allocate transfer buffers (first time only) and enable engine DSP.
    pub fn activate(&mut self) {
        self.reframer.allocate();
        self.reframer.reset();
        if let Some(patch) = self.patch.as_ref() {
            self.context
                .with_instance(self.token, Some(patch), &mut NullListener, |session| {
                    session.send_message("pd", "dsp", &[1.0]);
                });
        }
        self.activated = true;
        debug!(instantiation_id = self.instantiation_id(), "Activated");
    }

    pub fn deactivate(&mut self) {
        self.activated = false;
        debug!(instantiation_id = self.instantiation_id(), "Deactivated");
    }

    /// Run one host callback of `frames` frames.
    ///
    /// Order inside the critical section: control inputs, then engine blocks
    /// with each MIDI input event delivered before the block containing it.
    /// Engine output is written to the host afterwards.
    pub fn process<H: HostPorts + ?Sized>(&mut self, host: &mut H, frames: usize) {
        let Self {
            context,
            table,
            token,
            patch,
            controls,
            reframer,
            ingress,
            egress,
            outputs,
            urids,
            activated,
            ..
        } = self;
        let audio_in = table.indices(PortKind::AudioIn);
        let audio_out = table.indices(PortKind::AudioOut);
        let midi_in = table.indices(PortKind::MidiIn);
        let midi_out = table.indices(PortKind::MidiOut);

        outputs.clear();
        egress.begin(&mut *host, midi_out, urids);

        if !*activated {
            reframer.silence(&mut *host, audio_out, frames);
            egress.finish(&mut *host, midi_out, urids, outputs);
            return;
        }

        ingress.collect(&*host, midi_in, urids);
        let controls = &*controls;
        let mut dispatch = Dispatch {
            controls,
            outputs: &mut *outputs,
        };

        context.with_instance(*token, patch.as_ref(), &mut dispatch, |session| {
            controls.push(session.engine(), &*host);
            reframer.process(&mut *host, frames, audio_in, audio_out, |chunk, input, output| {
                ingress.deliver_until(session.engine(), chunk.end);
                let frame = u32::try_from(chunk.emit_at).unwrap_or(u32::MAX);
                session.notify(|listener| listener.block_started(frame));
                session.process_raw(input, output);
            });
            ingress.deliver_rest(session.engine());
        });

        controls.write_outputs(outputs.controls(), &mut *host);
        egress.finish(&mut *host, midi_out, urids, outputs);
    }

    pub fn instantiation_id(&self) -> i32 {
        self.router.instantiation_id()
    }

    pub fn router(&self) -> &NamespaceRouter {
        &self.router
    }

    pub fn controls(&self) -> &ControlValuePump {
        &self.controls
    }

    pub fn table(&self) -> &PortTable {
        &self.table
    }

    pub fn token(&self) -> InstanceToken {
        self.token
    }

    pub fn block_size(&self) -> usize {
        self.reframer.block_size()
    }

    /// Output delay in frames introduced by remainder buffering.
    pub fn latency(&self) -> usize {
        self.reframer.latency()
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }
}

impl<E: Engine> Drop for Instance<E> {
    fn drop(&mut self) {
        let Some(patch) = self.patch.take() else {
            return;
        };
        let bindings = std::mem::take(&mut self.bindings);
        self.context
            .with_instance(self.token, None, &mut NullListener, move |session| {
                session.select(&patch);
                for binding in bindings {
                    session.unbind(binding);
                }
                session.close_patch(patch);
            });
        debug!(instantiation_id = self.instantiation_id(), "Closed patch");
    }
}

//! Control port values in and out of the engine.

use crate::engine::Engine;
use crate::host::HostPorts;
use crate::namespace::NamespaceRouter;
use crate::port::{PortKind, PortTable};

/// A control port and its name on the engine bus.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedControl {
    pub port: usize,
    pub routed: String,
    pub default: f32,
}

/// Routed names of one instance's control ports.
#[derive(Clone, Debug)]
pub struct ControlValuePump {
    inputs: Vec<RoutedControl>,
    outputs: Vec<RoutedControl>,
}

impl ControlValuePump {
    pub fn new(table: &PortTable, router: &NamespaceRouter) -> Self {
        let routed = |kind: PortKind| -> Vec<RoutedControl> {
            table
                .of_kind(kind)
                .into_iter()
                .map(|port| RoutedControl {
                    port: port.index,
                    routed: router.route(port.name),
                    default: port.default_value(),
                })
                .collect()
        };
        Self {
            inputs: routed(PortKind::ControlIn),
            outputs: routed(PortKind::ControlOut),
        }
    }

    pub fn inputs(&self) -> &[RoutedControl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[RoutedControl] {
        &self.outputs
    }

    /// Send every control input's current value to its routed receiver.
    /// Unconnected inputs send their declared default.
    pub fn push<E, H>(&self, engine: &mut E, host: &H)
    where
        E: Engine + ?Sized,
        H: HostPorts + ?Sized,
    {
        for control in &self.inputs {
            let value = host.control_input(control.port).unwrap_or(control.default);
            engine.send_float(&control.routed, value);
        }
    }

    /// Output slot whose routed name is exactly `name`.
    pub fn output_slot(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|control| control.routed == name)
    }

    /// Write staged values (indexed by output slot) to the host ports.
    /// Slots without a value keep the port's previous value.
    pub fn write_outputs<H: HostPorts + ?Sized>(&self, staged: &[Option<f32>], host: &mut H) {
        for (control, value) in self.outputs.iter().zip(staged) {
            if let Some(value) = *value {
                host.set_control_output(control.port, value);
            }
        }
    }
}

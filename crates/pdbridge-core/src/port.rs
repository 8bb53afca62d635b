//! Static classification of a plugin type's ports.
//!
//! A [`PortTable`] is built once per plugin type from an ordered list of
//! [`PortSpec`]s and shared read-only by every instance of that type. The
//! position of a spec in the list is the host port index.

use crate::error::{BridgeError, Result};

/// Port direction and payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortKind {
    AudioIn,
    AudioOut,
    ControlIn,
    ControlOut,
    MidiIn,
    MidiOut,
}

impl PortKind {
    pub const ALL: [PortKind; 6] = [
        PortKind::AudioIn,
        PortKind::AudioOut,
        PortKind::ControlIn,
        PortKind::ControlOut,
        PortKind::MidiIn,
        PortKind::MidiOut,
    ];

    pub fn is_input(self) -> bool {
        matches!(self, PortKind::AudioIn | PortKind::ControlIn | PortKind::MidiIn)
    }

    pub fn is_audio(self) -> bool {
        matches!(self, PortKind::AudioIn | PortKind::AudioOut)
    }

    pub fn is_control(self) -> bool {
        matches!(self, PortKind::ControlIn | PortKind::ControlOut)
    }

    pub fn is_midi(self) -> bool {
        matches!(self, PortKind::MidiIn | PortKind::MidiOut)
    }

    fn slot(self) -> usize {
        match self {
            PortKind::AudioIn => 0,
            PortKind::AudioOut => 1,
            PortKind::ControlIn => 2,
            PortKind::ControlOut => 3,
            PortKind::MidiIn => 4,
            PortKind::MidiOut => 5,
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::AudioIn => write!(f, "audio input"),
            PortKind::AudioOut => write!(f, "audio output"),
            PortKind::ControlIn => write!(f, "control input"),
            PortKind::ControlOut => write!(f, "control output"),
            PortKind::MidiIn => write!(f, "MIDI input"),
            PortKind::MidiOut => write!(f, "MIDI output"),
        }
    }
}

/// Declared range of a control port.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlRange {
    pub min: f32,
    pub default: f32,
    pub max: f32,
}

/// One entry of a plugin type's port list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortSpec {
    pub kind: PortKind,
    pub name: &'static str,
    pub range: Option<ControlRange>,
}

impl PortSpec {
    pub const fn new(kind: PortKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            range: None,
        }
    }

    pub const fn audio_in(name: &'static str) -> Self {
        Self::new(PortKind::AudioIn, name)
    }

    pub const fn audio_out(name: &'static str) -> Self {
        Self::new(PortKind::AudioOut, name)
    }

    pub const fn control_in(name: &'static str) -> Self {
        Self::new(PortKind::ControlIn, name)
    }

    pub const fn control_out(name: &'static str) -> Self {
        Self::new(PortKind::ControlOut, name)
    }

    pub const fn midi_in(name: &'static str) -> Self {
        Self::new(PortKind::MidiIn, name)
    }

    pub const fn midi_out(name: &'static str) -> Self {
        Self::new(PortKind::MidiOut, name)
    }

    pub const fn with_range(mut self, min: f32, default: f32, max: f32) -> Self {
        self.range = Some(ControlRange { min, default, max });
        self
    }
}

/// A classified port with its host index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Port {
    pub index: usize,
    pub kind: PortKind,
    pub name: &'static str,
    pub range: Option<ControlRange>,
}

impl Port {
    /// Value used while the host leaves a control input unconnected.
    pub fn default_value(&self) -> f32 {
        self.range.map_or(0.0, |range| range.default)
    }
}

/// Ordered ports plus per-kind index subsets.
#[derive(Clone, Debug)]
pub struct PortTable {
    ports: Vec<Port>,
    by_kind: [Vec<usize>; 6],
}

impl PortTable {
    pub fn new(specs: &[PortSpec]) -> Self {
        let mut by_kind: [Vec<usize>; 6] = Default::default();
        let ports = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                by_kind[spec.kind.slot()].push(index);
                Port {
                    index,
                    kind: spec.kind,
                    name: spec.name,
                    range: spec.range,
                }
            })
            .collect();
        Self { ports, by_kind }
    }

    /// Check declared names and ranges.
    ///
    /// Names must be non-empty and unique within one kind. A control input
    /// and a control output may share a name; they then route to the same
    /// engine receiver.
    pub fn validate(&self) -> Result<()> {
        for kind in PortKind::ALL {
            let ports = self.of_kind(kind);
            for (i, port) in ports.iter().enumerate() {
                if port.name.is_empty() {
                    return Err(BridgeError::InvalidPortTable(format!(
                        "{kind} port {} has an empty name",
                        port.index
                    )));
                }
                if let Some(other) = ports[..i].iter().find(|other| other.name == port.name) {
                    return Err(BridgeError::InvalidPortTable(format!(
                        "{kind} ports {} and {} share the name '{}'",
                        other.index, port.index, port.name
                    )));
                }
                if let Some(range) = port.range {
                    if !(range.min <= range.default && range.default <= range.max) {
                        return Err(BridgeError::InvalidPortTable(format!(
                            "port '{}' range {}..{} does not contain default {}",
                            port.name, range.min, range.max, range.default
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn get(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Host indices of every port of `kind`, in declaration order.
    pub fn indices(&self, kind: PortKind) -> &[usize] {
        &self.by_kind[kind.slot()]
    }

    pub fn count(&self, kind: PortKind) -> usize {
        self.indices(kind).len()
    }

    pub fn of_kind(&self, kind: PortKind) -> Vec<&Port> {
        self.indices(kind).iter().map(|&i| &self.ports[i]).collect()
    }
}

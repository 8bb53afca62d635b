//! Per-callback view of the host's port buffers.

/// Port buffers for one processing callback, addressed by host port index.
///
/// `None` means the host left the port unconnected. Audio slices hold the
/// callback's frames; atom slices span the whole host buffer including the
/// atom header.
pub trait HostPorts {
    fn audio_input(&self, port: usize) -> Option<&[f32]>;

    fn audio_output(&mut self, port: usize) -> Option<&mut [f32]>;

    fn control_input(&self, port: usize) -> Option<f32>;

    fn set_control_output(&mut self, port: usize, value: f32);

    fn atom_input(&self, port: usize) -> Option<&[u8]>;

    fn atom_output(&mut self, port: usize) -> Option<&mut [u8]>;
}

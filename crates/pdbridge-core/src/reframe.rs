//! Host-callback to engine-block reframing.
//!
//! Host audio arrives as one slice per port of whatever length the host
//! chose. The engine consumes `block_size` frames per call from one
//! channel-major buffer (`channel * block_size + frame`). The reframer owns
//! both transfer buffers and runs the engine once per full block.

use tracing::warn;

use crate::config::RemainderPolicy;
use crate::host::HostPorts;

/// Position of one engine block within the current host callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// First host frame of this callback whose input the block consumes.
    pub start: usize,
    /// One past the last such frame.
    pub end: usize,
    /// Host frame at which this block's output becomes audible, used to
    /// time-stamp events the engine emits while running it.
    pub emit_at: usize,
}

#[derive(Debug)]
pub struct BlockReframer {
    block_size: usize,
    inputs: usize,
    outputs: usize,
    policy: RemainderPolicy,
    input: Vec<f32>,
    output: Vec<f32>,
    allocated: bool,
    /// Frames already staged in the transfer buffers (buffered policy).
    fill: usize,
    remainder_warned: bool,
}

impl BlockReframer {
    pub fn new(block_size: usize, inputs: usize, outputs: usize, policy: RemainderPolicy) -> Self {
        Self {
            block_size: block_size.max(1),
            inputs,
            outputs,
            policy,
            input: Vec::new(),
            output: Vec::new(),
            allocated: false,
            fill: 0,
            remainder_warned: false,
        }
    }

    /// Size the transfer buffers. Only the first call allocates.
    pub fn allocate(&mut self) {
        if self.allocated {
            return;
        }
        self.input = vec![0.0; self.block_size * self.inputs];
        self.output = vec![0.0; self.block_size * self.outputs];
        self.allocated = true;
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn policy(&self) -> RemainderPolicy {
        self.policy
    }

    /// Output delay in frames.
    pub fn latency(&self) -> usize {
        match self.policy {
            RemainderPolicy::Silence => 0,
            RemainderPolicy::Buffered => self.block_size,
        }
    }

    /// Forget staged partial blocks. Transfer buffers stay allocated.
    pub fn reset(&mut self) {
        self.fill = 0;
        self.input.fill(0.0);
        self.output.fill(0.0);
    }

    /// Move `frames` frames through the engine.
    ///
    /// `audio_in`/`audio_out` list the host port for each engine channel.
    /// `run` is called once per full engine block with the transfer buffers.
    /// Returns the number of blocks run. Before [`allocate`](Self::allocate)
    /// every output is silenced and nothing runs.
    pub fn process<H, F>(
        &mut self,
        host: &mut H,
        frames: usize,
        audio_in: &[usize],
        audio_out: &[usize],
        run: F,
    ) -> usize
    where
        H: HostPorts + ?Sized,
        F: FnMut(Chunk, &[f32], &mut [f32]),
    {
        if !self.allocated {
            silence(host, audio_out, 0..frames);
            return 0;
        }
        match self.policy {
            RemainderPolicy::Silence => self.process_whole_blocks(host, frames, audio_in, audio_out, run),
            RemainderPolicy::Buffered => self.process_buffered(host, frames, audio_in, audio_out, run),
        }
    }

    /// Write silence over the first `frames` frames of every output.
    pub fn silence<H: HostPorts + ?Sized>(&self, host: &mut H, audio_out: &[usize], frames: usize) {
        silence(host, audio_out, 0..frames);
    }

    fn process_whole_blocks<H, F>(
        &mut self,
        host: &mut H,
        frames: usize,
        audio_in: &[usize],
        audio_out: &[usize],
        mut run: F,
    ) -> usize
    where
        H: HostPorts + ?Sized,
        F: FnMut(Chunk, &[f32], &mut [f32]),
    {
        let block = self.block_size;
        let whole = frames - frames % block;
        let mut blocks = 0;

        for start in (0..whole).step_by(block) {
            for (channel, &port) in audio_in.iter().take(self.inputs).enumerate() {
                let region = &mut self.input[channel * block..(channel + 1) * block];
                copy_in(host.audio_input(port), start, region);
            }
            self.output.fill(0.0);
            let chunk = Chunk {
                start,
                end: start + block,
                emit_at: start,
            };
            run(chunk, &self.input, &mut self.output);
            blocks += 1;
            for (channel, &port) in audio_out.iter().take(self.outputs).enumerate() {
                let region = &self.output[channel * block..(channel + 1) * block];
                copy_out(region, host.audio_output(port), start);
            }
        }

        if whole < frames {
            silence(host, audio_out, whole..frames);
            if !self.remainder_warned {
                self.remainder_warned = true;
                warn!(
                    frames,
                    block_size = block,
                    "Host frame count is not a multiple of the engine block size; trailing frames are silenced"
                );
            }
        }
        blocks
    }

    fn process_buffered<H, F>(
        &mut self,
        host: &mut H,
        frames: usize,
        audio_in: &[usize],
        audio_out: &[usize],
        mut run: F,
    ) -> usize
    where
        H: HostPorts + ?Sized,
        F: FnMut(Chunk, &[f32], &mut [f32]),
    {
        let block = self.block_size;
        let mut pos = 0;
        let mut blocks = 0;

        while pos < frames {
            let take = (block - self.fill).min(frames - pos);
            let chunk_start = pos.saturating_sub(self.fill);

            for (channel, &port) in audio_in.iter().take(self.inputs).enumerate() {
                let at = channel * block + self.fill;
                copy_in(host.audio_input(port), pos, &mut self.input[at..at + take]);
            }
            for (channel, &port) in audio_out.iter().take(self.outputs).enumerate() {
                let at = channel * block + self.fill;
                copy_out(&self.output[at..at + take], host.audio_output(port), pos);
            }
            self.fill += take;
            pos += take;

            if self.fill == block {
                self.fill = 0;
                self.output.fill(0.0);
                let chunk = Chunk {
                    start: chunk_start,
                    end: pos,
                    emit_at: pos.min(frames.saturating_sub(1)),
                };
                run(chunk, &self.input, &mut self.output);
                blocks += 1;
            }
        }
        blocks
    }
}

/// Copy host input from `start` into `dst`, padding missing frames with
/// silence.
fn copy_in(src: Option<&[f32]>, start: usize, dst: &mut [f32]) {
    let available = src.and_then(|src| src.get(start..)).unwrap_or(&[]);
    let n = available.len().min(dst.len());
    dst[..n].copy_from_slice(&available[..n]);
    dst[n..].fill(0.0);
}

fn copy_out(src: &[f32], dst: Option<&mut [f32]>, start: usize) {
    if let Some(dst) = dst.and_then(|dst| dst.get_mut(start..)) {
        let n = dst.len().min(src.len());
        dst[..n].copy_from_slice(&src[..n]);
    }
}

fn silence<H: HostPorts + ?Sized>(host: &mut H, audio_out: &[usize], frames: std::ops::Range<usize>) {
    for &port in audio_out {
        if let Some(out) = host.audio_output(port) {
            let end = frames.end.min(out.len());
            if let Some(tail) = out.get_mut(frames.start.min(end)..end) {
                tail.fill(0.0);
            }
        }
    }
}

//! Byte-level access to LV2 atom event sequences.
//!
//! Layout (native endian): an 8-byte atom header `{size, type}`, an 8-byte
//! sequence body header `{unit, pad}`, then events `{frames: i64, size: u32,
//! type: u32, data}` each padded to 8 bytes. `size` in the atom header counts
//! everything after the atom header.

/// Atom header `{size, type}`.
pub const ATOM_HEADER: usize = 8;
/// Atom header plus sequence body header.
pub const SEQUENCE_HEADER: usize = 16;
/// Per-event `{frames, size, type}` header.
pub const EVENT_HEADER: usize = 16;

/// Host-mapped ids of `atom:Sequence`, `atom:frameTime` and
/// `midi:MidiEvent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Urids {
    pub atom_sequence: u32,
    pub atom_frame_time: u32,
    pub midi_event: u32,
}

#[inline]
pub fn pad_size(size: usize) -> usize {
    (size + 7) & !7
}

fn read_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at.checked_add(4)?)?;
    Some(u32::from_ne_bytes(bytes.try_into().ok()?))
}

fn read_i64(buf: &[u8], at: usize) -> Option<i64> {
    let bytes = buf.get(at..at.checked_add(8)?)?;
    Some(i64::from_ne_bytes(bytes.try_into().ok()?))
}

fn write_bytes(buf: &mut [u8], at: usize, bytes: &[u8]) {
    if let Some(dst) = buf.get_mut(at..at + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

/// One event borrowed from a host sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtomEvent<'a> {
    pub frames: i64,
    pub type_urid: u32,
    pub body: &'a [u8],
}

/// Bounds-checked iterator over a host-provided sequence.
///
/// Iteration stops at the first event whose header or body would run past
/// the end of the sequence.
#[derive(Clone, Debug)]
pub struct SequenceReader<'a> {
    events: &'a [u8],
    offset: usize,
}

impl<'a> SequenceReader<'a> {
    /// `None` when `buf` does not hold a frame-timed sequence.
    pub fn new(buf: &'a [u8], urids: &Urids) -> Option<Self> {
        let size = read_u32(buf, 0)? as usize;
        if read_u32(buf, 4)? != urids.atom_sequence {
            return None;
        }
        let end = ATOM_HEADER.saturating_add(size).min(buf.len());
        if end < SEQUENCE_HEADER {
            return Some(Self {
                events: &[],
                offset: 0,
            });
        }
        let unit = read_u32(buf, ATOM_HEADER)?;
        if unit != 0 && unit != urids.atom_frame_time {
            return None;
        }
        Some(Self {
            events: &buf[SEQUENCE_HEADER..end],
            offset: 0,
        })
    }
}

impl<'a> Iterator for SequenceReader<'a> {
    type Item = AtomEvent<'a>;

    fn next(&mut self) -> Option<AtomEvent<'a>> {
        let events = self.events;
        let Some((event, size)) = events.get(self.offset..).and_then(read_event) else {
            self.offset = events.len();
            return None;
        };
        self.offset = self
            .offset
            .saturating_add(EVENT_HEADER + pad_size(size))
            .min(events.len());
        Some(event)
    }
}

fn read_event(rest: &[u8]) -> Option<(AtomEvent<'_>, usize)> {
    let frames = read_i64(rest, 0)?;
    let size = read_u32(rest, 8)? as usize;
    let type_urid = read_u32(rest, 12)?;
    let body = rest.get(EVENT_HEADER..EVENT_HEADER.checked_add(size)?)?;
    Some((
        AtomEvent {
            frames,
            type_urid,
            body,
        },
        size,
    ))
}

/// Appends events to a host output sequence.
///
/// The writer does not borrow the buffer; every call takes it again so the
/// host buffers stay reachable between calls. Before the callback the host
/// declares the free body space as the atom header's `size`; capacity is
/// that plus the header itself.
#[derive(Clone, Debug)]
pub struct SequenceWriter {
    capacity: usize,
    len: usize,
    dropped: usize,
}

impl SequenceWriter {
    /// Start an empty sequence in `buf`. `None` if the declared capacity
    /// cannot hold the sequence headers.
    pub fn begin(buf: &mut [u8], urids: &Urids) -> Option<Self> {
        let declared = read_u32(buf, 0)? as usize;
        let capacity = ATOM_HEADER.saturating_add(declared).min(buf.len());
        if capacity < SEQUENCE_HEADER {
            return None;
        }
        let body_size = (SEQUENCE_HEADER - ATOM_HEADER) as u32;
        write_bytes(buf, 0, &body_size.to_ne_bytes());
        write_bytes(buf, 4, &urids.atom_sequence.to_ne_bytes());
        write_bytes(buf, 8, &0u32.to_ne_bytes());
        write_bytes(buf, 12, &0u32.to_ne_bytes());
        Some(Self {
            capacity,
            len: SEQUENCE_HEADER,
            dropped: 0,
        })
    }

    /// Append one event. Returns `false` and drops it when it does not fit.
    pub fn append(&mut self, buf: &mut [u8], frames: i64, type_urid: u32, data: &[u8]) -> bool {
        let needed = EVENT_HEADER + pad_size(data.len());
        if self.len + needed > self.capacity || buf.len() < self.capacity {
            self.dropped += 1;
            return false;
        }
        let at = self.len;
        write_bytes(buf, at, &frames.to_ne_bytes());
        write_bytes(buf, at + 8, &(data.len() as u32).to_ne_bytes());
        write_bytes(buf, at + 12, &type_urid.to_ne_bytes());
        write_bytes(buf, at + EVENT_HEADER, data);
        let padding = at + EVENT_HEADER + data.len()..at + needed;
        if let Some(pad) = buf.get_mut(padding) {
            pad.fill(0);
        }
        self.len += needed;
        write_bytes(buf, 0, &((self.len - ATOM_HEADER) as u32).to_ne_bytes());
        true
    }

    /// Close the sequence. Returns the total bytes written.
    pub fn finish(self, buf: &mut [u8]) -> usize {
        write_bytes(buf, 0, &((self.len - ATOM_HEADER) as u32).to_ne_bytes());
        self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == SEQUENCE_HEADER
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events refused for lack of space.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Stamp the body space after the atom header as the free space an output
/// port offers, as a host does before each callback.
pub fn declare_capacity(buf: &mut [u8]) {
    let body = buf.len().saturating_sub(ATOM_HEADER) as u32;
    write_bytes(buf, 0, &body.to_ne_bytes());
}

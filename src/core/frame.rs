//! Bounded accumulation of inbound bytes with terminator-delimited frame
//! extraction. One buffer per session; datagram transports bypass it.

use std::collections::VecDeque;

/// Byte ring bounded by a fixed capacity with drop-oldest eviction.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl FrameBuffer {
    /// Capacity must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame buffer capacity must be non-zero");
        Self {
            buf: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Appends bytes, evicting the oldest on overflow. Returns whether any
    /// eviction occurred.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() >= self.capacity {
            // The tail of the chunk alone fills the buffer.
            let evicted = !self.buf.is_empty() || bytes.len() > self.capacity;
            self.buf.clear();
            self.buf.extend(&bytes[bytes.len() - self.capacity..]);
            return evicted;
        }

        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.buf.drain(..overflow);
        }
        self.buf.extend(bytes);
        overflow > 0
    }

    /// Removes and returns the first complete frame delimited by
    /// `terminator`, without the terminator itself. Returns `None` while no
    /// complete frame is buffered.
    pub fn drain_up_to(&mut self, terminator: &[u8]) -> Option<Vec<u8>> {
        if terminator.is_empty() || self.buf.len() < terminator.len() {
            return None;
        }

        let haystack = self.buf.make_contiguous();
        let pos = haystack
            .windows(terminator.len())
            .position(|window| window == terminator)?;

        let frame: Vec<u8> = self.buf.drain(..pos).collect();
        self.buf.drain(..terminator.len());
        Some(frame)
    }

    /// Removes and returns everything currently buffered. Used to flush a
    /// partial frame when the session reaches a terminal state.
    pub fn drain_residue(&mut self) -> Vec<u8> {
        self.buf.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

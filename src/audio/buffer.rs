//! Fixed-capacity byte ring for the device's IO path
//!
//! Output cycles write into the ring, input cycles and the diagnostic tap
//! consume from it. The ring is owned by the IO engine and only touched
//! with the IO lock held; the counters are atomics so statistics can be read
//! without it.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{DriverError, Result};

/// Cursor state of the ring, comparable across calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingCursor {
    pub write_offset: usize,
    pub read_offset: usize,
    /// Bytes written but not yet consumed
    pub remaining: usize,
}

/// Circular byte buffer with a write cursor and an unread-byte count
pub struct RingBuffer {
    data: Box<[u8]>,
    write_offset: usize,
    read_offset: usize,
    remaining: usize,
    overrun_count: AtomicU64,
    dropped_bytes: AtomicU64,
}

impl RingBuffer {
    /// Create a zeroed ring of `capacity` bytes
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            data: vec![0u8; capacity.get()].into_boxed_slice(),
            write_offset: 0,
            read_offset: 0,
            remaining: 0,
            overrun_count: AtomicU64::new(0),
            dropped_bytes: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    pub fn cursor(&self) -> RingCursor {
        RingCursor {
            write_offset: self.write_offset,
            read_offset: self.read_offset,
            remaining: self.remaining,
        }
    }

    /// Append `src` at the write cursor, wrapping at the end.
    ///
    /// A write larger than the whole ring fails with `BufferOverrun` and
    /// leaves the ring untouched. When unread bytes would be overwritten the
    /// oldest ones are dropped and counted.
    pub fn write(&mut self, src: &[u8]) -> Result<()> {
        self.ensure_fits(src.len())?;
        let capacity = self.capacity();

        let first = src.len().min(capacity - self.write_offset);
        self.data[self.write_offset..self.write_offset + first].copy_from_slice(&src[..first]);
        self.data[..src.len() - first].copy_from_slice(&src[first..]);
        self.write_offset = (self.write_offset + src.len()) % capacity;

        let unread = self.remaining + src.len();
        if unread > capacity {
            self.dropped_bytes
                .fetch_add((unread - capacity) as u64, Ordering::Relaxed);
            self.remaining = capacity;
            self.read_offset = self.write_offset;
        } else {
            self.remaining = unread;
        }

        debug_assert!(self.check());
        Ok(())
    }

    /// Fail with `BufferOverrun` when `len` bytes exceed the whole ring.
    /// Rejections are counted.
    pub fn ensure_fits(&self, len: usize) -> Result<()> {
        let capacity = self.capacity();
        if len > capacity {
            self.overrun_count.fetch_add(1, Ordering::Relaxed);
            return Err(DriverError::BufferOverrun {
                requested: len,
                capacity,
            });
        }
        Ok(())
    }

    /// Discard up to `len` unread bytes, returning how many were discarded
    pub fn consume(&mut self, len: usize) -> usize {
        let taken = len.min(self.remaining);
        self.read_offset = (self.read_offset + taken) % self.capacity();
        self.remaining -= taken;
        debug_assert!(self.check());
        taken
    }

    /// Copy unread bytes into `out` and consume them.
    ///
    /// Returns the number of bytes copied; the rest of `out` is untouched.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let capacity = self.capacity();
        let len = out.len().min(self.remaining);
        let first = len.min(capacity - self.read_offset);
        out[..first].copy_from_slice(&self.data[self.read_offset..self.read_offset + first]);
        out[first..len].copy_from_slice(&self.data[..len - first]);
        self.consume(len)
    }

    /// Forget every unread byte and rewind both cursors
    pub fn clear(&mut self) {
        self.write_offset = 0;
        self.read_offset = 0;
        self.remaining = 0;
    }

    /// Cursor invariants: offsets in range, remaining within capacity and
    /// consistent with the distance between the cursors
    pub fn check(&self) -> bool {
        let capacity = self.capacity();
        self.write_offset < capacity
            && self.read_offset < capacity
            && self.remaining <= capacity
            && (self.read_offset + self.remaining) % capacity == self.write_offset
    }

    /// Transfers rejected for exceeding the capacity
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count.load(Ordering::Relaxed)
    }

    /// Unread bytes lost to overwriting
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes.load(Ordering::Relaxed)
    }

    /// Fill level as a fraction of capacity
    pub fn fill_level(&self) -> f32 {
        self.remaining as f32 / self.capacity() as f32
    }
}

//! Growable network buffer with explicit position tracking.
//!
//! Both the wire-facing and application-facing sides of a connection use
//! this type. It keeps a write position and a read cursor over a fixed
//! allocation, and grows by consume-and-replace: a bigger region is
//! allocated, written bytes are copied over, and the old region is dropped.
//! Growth never truncates unread data.

/// A byte region with capacity, write position, and read cursor.
///
/// Bytes between the read cursor and the write position are "unread".
/// Bytes past the write position are spare capacity available for
/// direct socket reads via [`Buffer::spare_mut`] / [`Buffer::advance_write`].
#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    /// Write position: data[..pos] has been written.
    pos: usize,
    /// Read cursor: data[start..pos] is unread.
    start: usize,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            pos: 0,
            start: 0,
        }
    }

    /// A buffer pre-filled with `bytes`, ready to be drained.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            pos: bytes.len(),
            start: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written but not yet consumed.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.start..self.pos]
    }

    pub fn unread_len(&self) -> usize {
        self.pos - self.start
    }

    pub fn has_unread(&self) -> bool {
        self.start < self.pos
    }

    /// Spare capacity past the write position.
    pub fn spare(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Writable view of the spare region. Pair with [`Buffer::advance_write`].
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let pos = self.pos;
        &mut self.data[pos..]
    }

    /// Marks `n` bytes of the spare region as written.
    pub fn advance_write(&mut self, n: usize) {
        debug_assert!(n <= self.spare());
        self.pos += n;
    }

    /// Appends `bytes`, growing if the spare region is too small.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.spare() < bytes.len() {
            self.grow(bytes.len());
        }
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Advances the read cursor past `n` consumed bytes.
    ///
    /// When everything written has been consumed, both cursors reset to
    /// zero so the whole region becomes spare again.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(self.start + n <= self.pos);
        self.start += n;
        if self.start == self.pos {
            self.start = 0;
            self.pos = 0;
        }
    }

    /// Discards the consumed prefix, moving unread bytes to offset 0.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.data.copy_within(self.start..self.pos, 0);
        self.pos -= self.start;
        self.start = 0;
    }

    /// Drops all content; the full capacity becomes spare.
    pub fn clear(&mut self) {
        self.start = 0;
        self.pos = 0;
    }

    /// Replaces the allocation with one holding at least `min_additional`
    /// more bytes past the current write position.
    ///
    /// New capacity is `max(2 * capacity, pos + min_additional)`. All
    /// written bytes are preserved; the read cursor is unchanged.
    pub fn grow(&mut self, min_additional: usize) {
        let needed = (self.capacity() * 2).max(self.pos + min_additional);
        let mut bigger = vec![0; needed];
        bigger[..self.pos].copy_from_slice(&self.data[..self.pos]);
        self.data = bigger;
    }

    /// Grows until at least `min` spare bytes are available.
    pub fn ensure_spare(&mut self, min: usize) {
        if self.spare() < min {
            self.grow(min);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Append-only scratch buffers and the zero-copy views taken from them.

use crate::pool::BufferPool;

/// A reusable append buffer holding the current key, type tag, or value.
///
/// Bytes are appended until the decoder takes a [`Slip`]: a borrowed view
/// of everything written so far. Taking the view resets the write cursor,
/// so the next append starts over at offset zero and the backing array is
/// never reallocated between tokens.
#[derive(Debug)]
pub struct Scratch {
    array: Vec<u8>,
    count: usize,
    initial: usize,
    pool: &'static BufferPool,
}

impl Scratch {
    /// A scratch buffer backed by the global pool.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_pool(capacity, BufferPool::global())
    }

    pub fn with_pool(capacity: usize, pool: &'static BufferPool) -> Self {
        Self {
            array: pool.acquire(capacity),
            count: 0,
            initial: capacity,
            pool,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.array.len()
    }

    /// The bytes written since the last slip.
    pub fn as_bytes(&self) -> &[u8] {
        &self.array[..self.count]
    }

    pub fn first(&self) -> Option<u8> {
        self.as_bytes().first().copied()
    }

    pub fn append(&mut self, byte: u8) {
        if self.count == self.array.len() {
            self.grow(self.count + 1);
        }
        self.array[self.count] = byte;
        self.count += 1;
    }

    /// Bulk copy of a plain run.
    pub fn extend(&mut self, bytes: &[u8]) {
        let end = self.count + bytes.len();
        if end > self.array.len() {
            self.grow(end);
        }
        self.array[self.count..end].copy_from_slice(bytes);
        self.count = end;
    }

    /// Ensures room for `min` bytes, doubling at least.
    pub fn grow(&mut self, min: usize) {
        if min <= self.array.len() {
            return;
        }
        let size = min.max(self.array.len() * 2).max(self.initial);
        let mut array = self.pool.acquire(size);
        array[..self.count].copy_from_slice(&self.array[..self.count]);
        let old = std::mem::replace(&mut self.array, array);
        self.pool.release(old);
    }

    /// Takes a view of the contents and resets the cursor.
    pub fn slip(&mut self) -> Slip<'_> {
        let count = std::mem::take(&mut self.count);
        Slip(&self.array[..count])
    }

    /// Like [`Scratch::slip`], but an empty buffer yields `default`
    /// as a one-byte tag.
    pub fn slip_or(&mut self, default: u8) -> Slip<'_> {
        if self.count == 0 {
            self.append(default);
        }
        self.slip()
    }

    /// Discards the contents without taking a view.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Returns the backing array to the pool. The buffer stays usable and
    /// reacquires an array on the next append.
    pub fn close(&mut self) {
        self.count = 0;
        let array = std::mem::take(&mut self.array);
        self.pool.release(array);
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.close();
    }
}

/// A borrowed, immutable view over a scratch buffer.
///
/// The view lives only until the owning buffer is written again; sinks
/// that need the bytes afterwards must copy them with [`Slip::to_vec`] or
/// [`Slip::to_string_lossy`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Slip<'a>(&'a [u8]);

impl<'a> Slip<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Slip(bytes)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// The view as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Result<&'a str, core::str::Utf8Error> {
        core::str::from_utf8(self.0)
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.0).into_owned()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl core::ops::Deref for Slip<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0
    }
}

impl AsRef<[u8]> for Slip<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0
    }
}

impl core::fmt::Debug for Slip<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.0))
    }
}

impl core::fmt::Display for Slip<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.0))
    }
}

impl PartialEq<str> for Slip<'_> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for Slip<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Slip<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}
